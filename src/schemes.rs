/**
This module describes the supported tagging schemes. A scheme only knows how to read a tag into a
`Marker` (where we are in a chunk and which entity type the chunk has) and how to write a marker
back into a tag. The actual chunking is done by the `ChunksTagsTranslator`.
*/
use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Outside tag of the letter based schemes.
pub const OUTSIDE_TAG: &str = "O";
/// Outside tag of the OntoNotes scheme.
pub const ONTONOTES_OUTSIDE_TAG: &str = "*";
/// Reserved padding tag. It is never part of a chunk.
pub const PAD_TAG: &str = "<pad>";
/// Character separating the prefix from the entity type, as in `B-PER`.
pub const DELIMITER: char = '-';

#[derive(
    Debug, Clone, Copy, Sequence, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
/// Enumeration of the supported schemes.
pub enum SchemeType {
    /// Also known as IOB1. `B` only marks a chunk following a chunk of the same type.
    BIO1,
    /// Also known as IOB2. Every chunk starts with a `B`.
    BIO2,
    /// Also known as IOBES. `E` closes a chunk and `S` marks single token chunks.
    BIOES,
    /// Same as BIOES, with `M` (middle) instead of `I`.
    BMES,
    /// CoNLL-2012 bracket notation: `(PER*`, `*`, `*)` and `(PER)`.
    OntoNotes,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown tagging scheme `{0}`. Supported schemes are BIO1, BIO2, BIOES, BMES and OntoNotes")]
pub struct UnknownSchemeError(pub String);

impl FromStr for SchemeType {
    type Err = UnknownSchemeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bio1" | "iob1" => Ok(Self::BIO1),
            "bio2" | "iob2" => Ok(Self::BIO2),
            "bioes" | "iobes" => Ok(Self::BIOES),
            "bmes" => Ok(Self::BMES),
            "ontonotes" => Ok(Self::OntoNotes),
            _ => Err(UnknownSchemeError(String::from(s))),
        }
    }
}

impl Display for SchemeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Position of a token relative to the chunk containing it. The letters used for each position
/// depend on the scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Begin,
    Inside,
    End,
    Single,
    Outside,
}

/// A parsed tag. The entity type borrows from the tag it was read from. OntoNotes inside and end
/// tags do not carry a type, hence the `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker<'t> {
    Outside,
    Begin(&'t str),
    Inside(Option<&'t str>),
    End(Option<&'t str>),
    Single(&'t str),
}

/// Letters of a letter based scheme. Schemes without `end` or `single` letters fall back on the
/// inside and begin letters respectively.
#[derive(Debug, PartialEq, Eq)]
struct Letters {
    begin: &'static str,
    inside: &'static str,
    end: Option<&'static str>,
    single: Option<&'static str>,
}

const BIO_LETTERS: Letters = Letters {
    begin: "B",
    inside: "I",
    end: None,
    single: None,
};
const BIOES_LETTERS: Letters = Letters {
    begin: "B",
    inside: "I",
    end: Some("E"),
    single: Some("S"),
};
const BMES_LETTERS: Letters = Letters {
    begin: "B",
    inside: "M",
    end: Some("E"),
    single: Some("S"),
};

impl Letters {
    fn letter(&self, position: Position) -> &'static str {
        match position {
            Position::Begin => self.begin,
            Position::Inside => self.inside,
            Position::End => self.end.unwrap_or(self.inside),
            Position::Single => self.single.unwrap_or(self.begin),
            Position::Outside => OUTSIDE_TAG,
        }
    }

    fn parse<'t>(&self, tag: &'t str) -> Marker<'t> {
        let Some((prefix, entity_type)) = tag.split_once(DELIMITER) else {
            return Marker::Outside;
        };
        if entity_type.is_empty() {
            return Marker::Outside;
        }
        if prefix == self.begin {
            Marker::Begin(entity_type)
        } else if prefix == self.inside {
            Marker::Inside(Some(entity_type))
        } else if self.end == Some(prefix) {
            Marker::End(Some(entity_type))
        } else if self.single == Some(prefix) {
            Marker::Single(entity_type)
        } else {
            Marker::Outside
        }
    }
}

impl SchemeType {
    /// Iterates over every supported scheme.
    pub fn all() -> impl Iterator<Item = SchemeType> {
        all::<SchemeType>()
    }

    fn letters(&self) -> Option<&'static Letters> {
        match self {
            Self::BIO1 | Self::BIO2 => Some(&BIO_LETTERS),
            Self::BIOES => Some(&BIOES_LETTERS),
            Self::BMES => Some(&BMES_LETTERS),
            Self::OntoNotes => None,
        }
    }

    /// Tag used for the tokens outside any chunk.
    pub fn outside_tag(&self) -> &'static str {
        match self {
            Self::OntoNotes => ONTONOTES_OUTSIDE_TAG,
            _ => OUTSIDE_TAG,
        }
    }

    /// Reads a tag. Tags that cannot be read with this scheme are considered outside.
    pub(crate) fn parse_tag<'t>(&self, tag: &'t str) -> Marker<'t> {
        match self.letters() {
            Some(letters) => {
                if tag == OUTSIDE_TAG {
                    Marker::Outside
                } else {
                    letters.parse(tag)
                }
            }
            None => parse_ontonotes(tag),
        }
    }

    /// Writes the tag of a token at `position` inside a chunk of type `entity_type`.
    pub fn render(&self, position: Position, entity_type: &str) -> String {
        match (self.letters(), position) {
            (_, Position::Outside) => String::from(self.outside_tag()),
            (Some(letters), position) => {
                format!("{}{}{}", letters.letter(position), DELIMITER, entity_type)
            }
            (None, Position::Begin) => format!("({}*", entity_type),
            (None, Position::Inside) => String::from("*"),
            (None, Position::End) => String::from("*)"),
            (None, Position::Single) => format!("({})", entity_type),
        }
    }

    /// Is `tag` a well formed tag of this scheme?
    pub fn is_valid_tag(&self, tag: &str) -> bool {
        match self.parse_tag(tag) {
            Marker::Outside => tag == self.outside_tag(),
            _ => true,
        }
    }

    /// Every tag of this scheme for the given entity types, outside tag first. Types are emitted
    /// in the given order, positions in the `Begin, Inside, End, Single` order. Duplicates (type
    /// free OntoNotes tags, or BIO single/end tags) are only emitted once.
    pub fn tags_for<S: AsRef<str>>(&self, entity_types: &[S]) -> Vec<String> {
        let mut tags = vec![String::from(self.outside_tag())];
        for entity_type in entity_types {
            for position in [
                Position::Begin,
                Position::Inside,
                Position::End,
                Position::Single,
            ] {
                let tag = self.render(position, entity_type.as_ref());
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        tags
    }
}

fn parse_ontonotes(tag: &str) -> Marker<'_> {
    match tag {
        "*" => Marker::Inside(None),
        "*)" => Marker::End(None),
        _ => match tag.strip_prefix('(') {
            Some(rest) => {
                if let Some(entity_type) = rest.strip_suffix('*').filter(|t| !t.is_empty()) {
                    Marker::Begin(entity_type)
                } else if let Some(entity_type) = rest.strip_suffix(')').filter(|t| !t.is_empty())
                {
                    Marker::Single(entity_type)
                } else {
                    Marker::Outside
                }
            }
            None => Marker::Outside,
        },
    }
}
