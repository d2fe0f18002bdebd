use casexml_shared::errors::Error;
use core::fmt::Display;
use log::warn;
use serde::{Serialize, Serializer};

/// Type of an entry as declared by its `<type>` element
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EntryType {
    #[default]
    Char,
    Integer,
    Logical,
    Real,
}

impl EntryType {
    /// Converts the text of a `<type>` element. Unknown types are treated as char.
    pub fn from_type_str(s: &str) -> Self {
        // char(10) and friends only carry a width hint
        let base = s.trim().split('(').next().unwrap_or_default().to_lowercase();

        match base.as_str() {
            "char" => Self::Char,
            "integer" => Self::Integer,
            "logical" => Self::Logical,
            "real" => Self::Real,
            other => {
                warn!("unknown entry type '{other}', treating as char");
                Self::Char
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::Integer => "integer",
            Self::Logical => "logical",
            Self::Real => "real",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed entry value
#[derive(Clone, PartialEq, Debug)]
pub enum EntryValue {
    Char(String),
    Integer(i64),
    Logical(bool),
    Real(f64),
}

impl EntryValue {
    /// Converts a raw attribute value into a value of the given type
    pub fn parse(entry_type: EntryType, raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();

        let value = match entry_type {
            EntryType::Char => Self::Char(raw.to_string()),
            EntryType::Integer => Self::Integer(
                trimmed
                    .parse::<i64>()
                    .map_err(|err| Error::Config(format!("error parsing {raw} as integer: {err}")))?,
            ),
            EntryType::Logical => Self::Logical(
                parse_logical(trimmed)
                    .ok_or_else(|| Error::Config(format!("error parsing {raw} as logical")))?,
            ),
            EntryType::Real => Self::Real(
                trimmed
                    .parse::<f64>()
                    .map_err(|err| Error::Config(format!("error parsing {raw} as real: {err}")))?,
            ),
        };

        Ok(value)
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            Self::Char(_) => EntryType::Char,
            Self::Integer(_) => EntryType::Integer,
            Self::Logical(_) => EntryType::Logical,
            Self::Real(_) => EntryType::Real,
        }
    }

    #[must_use]
    pub fn to_bool(&self) -> bool {
        if !matches!(self, Self::Logical(_)) {
            warn!("entry value is not a logical");
        }

        match self {
            Self::Logical(value) => *value,
            Self::Integer(value) => *value != 0,
            Self::Real(value) => *value != 0.0,
            Self::Char(value) => parse_logical(value.trim()).unwrap_or(false),
        }
    }

    #[must_use]
    pub fn to_int(&self) -> i64 {
        if !matches!(self, Self::Integer(_)) {
            warn!("entry value is not an integer");
        }

        match self {
            Self::Integer(value) => *value,
            Self::Logical(value) => i64::from(*value),
            Self::Real(value) => *value as i64,
            Self::Char(value) => value.trim().parse().unwrap_or(0),
        }
    }

    #[must_use]
    pub fn to_real(&self) -> f64 {
        if !matches!(self, Self::Real(_)) {
            warn!("entry value is not a real");
        }

        match self {
            Self::Real(value) => *value,
            Self::Integer(value) => *value as f64,
            Self::Logical(value) => f64::from(u8::from(*value)),
            Self::Char(value) => value.trim().parse().unwrap_or(0.0),
        }
    }

    #[allow(clippy::inherent_to_string_shadow_display)]
    #[must_use]
    pub fn to_string(&self) -> String {
        if !matches!(self, Self::Char(_)) {
            warn!("entry value is not a char");
        }

        format!("{self}")
    }

    /// Splits a comma separated char value into its parts
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::Char(value) => split_list(value),
            other => {
                warn!("entry value is not a list");
                vec![format!("{other}")]
            }
        }
    }
}

fn parse_logical(s: &str) -> Option<bool> {
    match s.to_uppercase().as_str() {
        "TRUE" | "T" | ".TRUE." => Some(true),
        "FALSE" | "F" | ".FALSE." => Some(false),
        _ => None,
    }
}

/// Comma separated list, each element trimmed, empty elements dropped
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl Display for EntryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Char(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Logical(true) => write!(f, "TRUE"),
            Self::Logical(false) => write!(f, "FALSE"),
            Self::Real(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for EntryValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Char(value) => serializer.serialize_str(value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Logical(value) => serializer.serialize_bool(*value),
            Self::Real(value) => serializer.serialize_f64(*value),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case("char", EntryType::Char)]
    #[test_case("char(10)", EntryType::Char)]
    #[test_case("integer", EntryType::Integer)]
    #[test_case(" Logical ", EntryType::Logical)]
    #[test_case("real", EntryType::Real)]
    #[test_case("complex", EntryType::Char)]
    fn type_names(input: &str, expected: EntryType) {
        assert_eq!(EntryType::from_type_str(input), expected);
    }

    #[test]
    fn unknown_type_warns() {
        testing_logger::setup();

        assert_eq!(EntryType::from_type_str("integer"), EntryType::Integer);
        assert_eq!(EntryType::from_type_str("complex"), EntryType::Char);

        testing_logger::validate(|captured_logs| {
            assert_eq!(captured_logs.len(), 1);
            assert_eq!(captured_logs[0].level, log::Level::Warn);
            assert!(captured_logs[0].body.contains("complex"));
        });
    }

    #[test]
    fn parse_values() {
        let v = EntryValue::parse(EntryType::Logical, "true").unwrap();
        assert_eq!(v, EntryValue::Logical(true));
        assert!(v.to_bool());
        assert_eq!(1, v.to_int());
        assert_eq!("TRUE", format!("{v}"));

        let v = EntryValue::parse(EntryType::Logical, ".false.").unwrap();
        assert_eq!(v, EntryValue::Logical(false));

        let v = EntryValue::parse(EntryType::Integer, " -12 ").unwrap();
        assert_eq!(v, EntryValue::Integer(-12));
        assert!(v.to_bool());
        assert_eq!(-12.0, v.to_real());

        let v = EntryValue::parse(EntryType::Real, "1.5e3").unwrap();
        assert_eq!(v, EntryValue::Real(1500.0));
        assert_eq!(1500, v.to_int());

        let v = EntryValue::parse(EntryType::Char, "cam, clm ,,cice").unwrap();
        assert_eq!(v.to_list(), vec!["cam", "clm", "cice"]);
        assert_eq!(v.to_string(), "cam, clm ,,cice");
    }

    #[test_case(EntryType::Integer, "1.5")]
    #[test_case(EntryType::Integer, "ten")]
    #[test_case(EntryType::Logical, "yes please")]
    #[test_case(EntryType::Real, "1,5")]
    fn parse_failures(entry_type: EntryType, raw: &str) {
        assert!(matches!(EntryValue::parse(entry_type, raw), Err(Error::Config(_))));
    }

    #[test]
    fn serializes_typed() {
        let values = vec![
            EntryValue::Char("x".into()),
            EntryValue::Integer(3),
            EntryValue::Logical(false),
            EntryValue::Real(0.5),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["x",3,false,0.5]"#);
    }

    #[test]
    fn lossy_conversion_warns() {
        testing_logger::setup();

        let v = EntryValue::Integer(4);
        let _ = v.to_bool();
        let _ = v.to_int();

        testing_logger::validate(|captured_logs| {
            assert_eq!(captured_logs.len(), 1);
            assert_eq!(captured_logs[0].level, log::Level::Warn);
        });
    }
}
