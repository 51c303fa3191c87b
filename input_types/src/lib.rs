//! # Input Types
//!
//! Key-chord types shared by the keybinding dispatcher and the shell.
//!
//! ## Philosophy
//!
//! - **One spelling per chord**: `"Shift+Ctrl+F"` and `"ctrl+shift+f"` are the same chord
//! - **Parse at the edge**: Raw strings from the host or a keymap become a [`Chord`] once
//! - **Modifiers are a set**: Order in the source string never matters
//!
//! ## Canonical form
//!
//! Lower case, modifiers first in the order `ctrl`, `alt`, `shift`, `meta`,
//! then the key, joined with `+`. A literal plus key is written `ctrl++`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a chord string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordError {
    #[error("empty chord")]
    Empty,

    #[error("unknown modifier '{modifier}' in chord '{chord}'")]
    UnknownModifier { chord: String, modifier: String },

    #[error("chord '{0}' has no key")]
    MissingKey(String),

    #[error("chord '{0}' has an empty segment")]
    EmptySegment(String),
}

/// Modifier keys held during a chord
///
/// Bitflags; the declaration order of the constants is the canonical
/// display order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Modifiers {
    bits: u8,
}

impl Modifiers {
    /// No modifiers
    pub const NONE: Self = Self { bits: 0 };
    /// Control key
    pub const CTRL: Self = Self { bits: 1 };
    /// Alt / Option key
    pub const ALT: Self = Self { bits: 1 << 1 };
    /// Shift key
    pub const SHIFT: Self = Self { bits: 1 << 2 };
    /// Meta / Command / Super key
    pub const META: Self = Self { bits: 1 << 3 };

    const NAMED: [(Modifiers, &'static str); 4] = [
        (Self::CTRL, "ctrl"),
        (Self::ALT, "alt"),
        (Self::SHIFT, "shift"),
        (Self::META, "meta"),
    ];

    /// Adds a modifier
    pub fn with(self, other: Modifiers) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks that every modifier in `other` is held
    pub fn contains(&self, other: Modifiers) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Returns true if no modifiers are held
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Looks up a modifier by name, accepting common aliases
    pub fn from_name(name: &str) -> Option<Modifiers> {
        match name {
            "ctrl" | "control" => Some(Self::CTRL),
            "alt" | "option" | "opt" => Some(Self::ALT),
            "shift" => Some(Self::SHIFT),
            "meta" | "cmd" | "command" | "super" | "win" => Some(Self::META),
            _ => None,
        }
    }

    /// Iterates held modifiers in canonical order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        Self::NAMED
            .into_iter()
            .filter(move |(m, _)| self.contains(*m))
            .map(|(_, name)| name)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        f.write_str(&names.join("+"))
    }
}

/// A normalized key chord such as `ctrl+shift+f` or `esc`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Chord {
    canonical: String,
    modifiers: Modifiers,
}

impl Chord {
    /// Parses and normalizes a chord string
    pub fn parse(raw: &str) -> Result<Self, ChordError> {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return Err(ChordError::Empty);
        }

        let (prefix, key) = split_key(&lowered);
        let key = match key {
            Some(k) if !k.is_empty() => k,
            _ => return Err(ChordError::MissingKey(raw.to_string())),
        };

        let mut modifiers = Modifiers::NONE;
        if let Some(prefix) = prefix {
            for part in prefix.split('+') {
                let part = part.trim();
                if part.is_empty() {
                    return Err(ChordError::EmptySegment(raw.to_string()));
                }
                let m = Modifiers::from_name(part).ok_or_else(|| ChordError::UnknownModifier {
                    chord: raw.to_string(),
                    modifier: part.to_string(),
                })?;
                modifiers = modifiers.with(m);
            }
        }

        let key = key.trim();
        if Modifiers::from_name(key).is_some() {
            return Err(ChordError::MissingKey(raw.to_string()));
        }
        let key = canonical_key(key);

        let canonical = if modifiers.is_empty() {
            key.to_string()
        } else {
            format!("{}+{}", modifiers, key)
        };

        Ok(Self {
            canonical,
            modifiers,
        })
    }

    /// Modifiers held in this chord
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Returns true if at least one modifier is held
    pub fn has_modifiers(&self) -> bool {
        !self.modifiers().is_empty()
    }

    /// The key without modifiers
    pub fn key(&self) -> &str {
        let mods = self.modifiers();
        if mods.is_empty() {
            &self.canonical
        } else {
            // "<mods>+<key>"; the modifier prefix never contains a bare '+'.
            let prefix_len = mods.to_string().len() + 1;
            &self.canonical[prefix_len..]
        }
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

/// Splits `"a+b+key"` into (`Some("a+b")`, `Some("key")`), handling a literal `+` key.
fn split_key(s: &str) -> (Option<&str>, Option<&str>) {
    if s == "+" {
        return (None, Some("+"));
    }
    if let Some(prefix) = s.strip_suffix("++") {
        return (Some(prefix), Some("+"));
    }
    match s.rsplit_once('+') {
        Some((prefix, key)) => (Some(prefix), Some(key)),
        None => (None, Some(s)),
    }
}

fn canonical_key(key: &str) -> &str {
    match key {
        "escape" => "esc",
        "return" => "enter",
        "del" => "delete",
        "spacebar" => "space",
        other => other,
    }
}

impl FromStr for Chord {
    type Err = ChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Chord {
    type Error = ChordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Chord> for String {
    fn from(chord: Chord) -> Self {
        chord.canonical
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_order_is_canonical() {
        let a = Chord::parse("Shift+Ctrl+F").unwrap();
        let b = Chord::parse("ctrl+shift+f").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "ctrl+shift+f");
        assert_eq!(a.key(), "f");
        assert!(a.modifiers().contains(Modifiers::CTRL.with(Modifiers::SHIFT)));
    }

    #[test]
    fn test_plain_key_has_no_modifiers() {
        let esc = Chord::parse(" Escape ").unwrap();
        assert_eq!(esc.as_str(), "esc");
        assert!(!esc.has_modifiers());
        assert_eq!(esc.key(), "esc");
    }

    #[test]
    fn test_aliases() {
        assert_eq!(Chord::parse("cmd+option+p").unwrap().as_str(), "alt+meta+p");
        assert_eq!(Chord::parse("Control+Return").unwrap().as_str(), "ctrl+enter");
    }

    #[test]
    fn test_literal_plus_key() {
        let plus = Chord::parse("ctrl++").unwrap();
        assert_eq!(plus.as_str(), "ctrl++");
        assert_eq!(plus.key(), "+");
        assert_eq!(Chord::parse("+").unwrap().key(), "+");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Chord::parse("   "), Err(ChordError::Empty));
        assert!(matches!(
            Chord::parse("hyper+x"),
            Err(ChordError::UnknownModifier { .. })
        ));
        assert!(matches!(Chord::parse("ctrl+"), Err(ChordError::MissingKey(_))));
        assert!(matches!(Chord::parse("ctrl+shift"), Err(ChordError::MissingKey(_))));
        assert!(matches!(Chord::parse("ctrl++f"), Err(ChordError::EmptySegment(_))));
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let chord: Chord = serde_json::from_str("\"Alt+Ctrl+K\"").unwrap();
        assert_eq!(serde_json::to_string(&chord).unwrap(), "\"ctrl+alt+k\"");
        assert!(serde_json::from_str::<Chord>("\"\"").is_err());
    }

    #[test]
    fn test_modifiers_display() {
        assert_eq!(Modifiers::NONE.to_string(), "");
        assert_eq!(Modifiers::META.with(Modifiers::CTRL).to_string(), "ctrl+meta");
    }
}
