//! Fixed class and subject lists a batch can be created for.

use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// Separator between class and subject in a batch description.
pub const DESCRIPTION_SEPARATOR: &str = " - ";

pub const CLASSES: [&str; 12] = [
    "Class 1",
    "Class 2",
    "Class 3",
    "Class 4",
    "Class 5",
    "Class 6",
    "Class 7",
    "Class 8",
    "Class 9",
    "Class 10",
    "HSC 1st Year",
    "HSC 2nd Year",
];

pub const SUBJECTS: [&str; 9] = [
    "Mathematics",
    "Higher Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "English",
    "Bangla",
    "ICT",
    "General Science",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLevel(&'static str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject(&'static str);

impl ClassLevel {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl FromStr for ClassLevel {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CLASSES
            .iter()
            .find(|name| **name == s)
            .map(|name| ClassLevel(*name))
            .ok_or_else(|| {
                ApiError::validation(format!("Class must be one of: {}", CLASSES.join(", ")))
            })
    }
}

impl FromStr for Subject {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SUBJECTS
            .iter()
            .find(|name| **name == s)
            .map(|name| Subject(*name))
            .ok_or_else(|| {
                ApiError::validation(format!("Subject must be one of: {}", SUBJECTS.join(", ")))
            })
    }
}

impl fmt::Display for ClassLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub fn compose_description(class: &str, subject: &str) -> String {
    format!("{}{}{}", class, DESCRIPTION_SEPARATOR, subject)
}

/// Class prefix of a `"<class> - <subject>"` description, if it has one.
pub fn class_from_description(description: &str) -> Option<&str> {
    description
        .split_once(DESCRIPTION_SEPARATOR)
        .map(|(class, _)| class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_values_after_trimming() {
        assert_eq!("  Class 5 ".parse::<ClassLevel>().unwrap().as_str(), "Class 5");
        assert_eq!("HSC 2nd Year".parse::<ClassLevel>().unwrap().as_str(), "HSC 2nd Year");
        assert_eq!("ICT".parse::<Subject>().unwrap().to_string(), "ICT");
    }

    #[test]
    fn unknown_values_list_the_allowed_ones() {
        let err = "Class 11".parse::<ClassLevel>().unwrap_err();
        assert!(matches!(&err, ApiError::Validation(msg) if msg.starts_with("Class must be one of: Class 1, Class 2")));

        let err = "physics".parse::<Subject>().unwrap_err();
        assert!(matches!(&err, ApiError::Validation(msg) if msg.ends_with("ICT, General Science")));
    }

    #[test]
    fn description_round_trips_class() {
        let description = compose_description("Class 5", "Physics");
        assert_eq!(description, "Class 5 - Physics");
        assert_eq!(class_from_description(&description), Some("Class 5"));
    }

    #[test]
    fn description_without_separator_has_no_class() {
        assert_eq!(class_from_description("Evening batch"), None);
        assert_eq!(class_from_description("Class 5-Physics"), None);
    }
}
