//! Ordered step list of a replacement program.
//!
//! On the wire the steps are a JSON object of `title -> description` whose key
//! order is meaningful. Storage keeps them as an array of pairs because JSONB
//! does not preserve object key order.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStep {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSteps(Vec<ProgramStep>);

impl ProgramSteps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step, or replace the description of an existing title in place
    pub fn insert(&mut self, title: impl Into<String>, description: impl Into<String>) {
        let title = title.into();
        let description = description.into();

        match self.0.iter_mut().find(|step| step.title == title) {
            Some(step) => step.description = description,
            None => self.0.push(ProgramStep { title, description }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramStep> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Array-of-pairs form written to the database
    pub fn to_storage(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.0
                .iter()
                .map(|step| {
                    serde_json::json!({
                        "title": step.title,
                        "description": step.description,
                    })
                })
                .collect(),
        )
    }

    pub fn from_storage(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let steps: Vec<ProgramStep> = serde_json::from_value(value)?;
        Ok(Self(steps))
    }
}

impl Serialize for ProgramSteps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for step in &self.0 {
            map.serialize_entry(&step.title, &step.description)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProgramSteps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StepsVisitor;

        impl<'de> Visitor<'de> for StepsVisitor {
            type Value = ProgramSteps;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of step title to description, or a list of steps")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut steps = ProgramSteps::new();
                while let Some((title, description)) = access.next_entry::<String, String>()? {
                    if title.trim().is_empty() {
                        return Err(de::Error::custom("step title must not be empty"));
                    }
                    steps.insert(title, description);
                }
                Ok(steps)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut steps = ProgramSteps::new();
                while let Some(step) = access.next_element::<ProgramStep>()? {
                    steps.insert(step.title, step.description);
                }
                Ok(steps)
            }
        }

        deserializer.deserialize_any(StepsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_order_is_preserved() {
        let steps: ProgramSteps =
            serde_json::from_str(r#"{"Model": "therapist models", "Prompt": "verbal", "Fade": "remove"}"#)
                .unwrap();

        let titles: Vec<_> = steps.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Model", "Prompt", "Fade"]);

        let json = serde_json::to_string(&steps).unwrap();
        assert_eq!(
            json,
            r#"{"Model":"therapist models","Prompt":"verbal","Fade":"remove"}"#
        );
    }

    #[test]
    fn test_storage_form_is_an_array() {
        let mut steps = ProgramSteps::new();
        steps.insert("Zeta", "last alphabetically, first in order");
        steps.insert("Alpha", "second");

        let stored = steps.to_storage();
        assert!(stored.is_array());
        assert_eq!(stored[0]["title"], "Zeta");

        let restored = ProgramSteps::from_storage(stored).unwrap();
        assert_eq!(restored, steps);
    }

    #[test]
    fn test_duplicate_title_replaces_in_place() {
        let mut steps = ProgramSteps::new();
        steps.insert("A", "one");
        steps.insert("B", "two");
        steps.insert("A", "three");

        assert_eq!(steps.len(), 2);
        assert_eq!(steps.iter().next().unwrap().description, "three");
    }

    #[test]
    fn test_empty_title_rejected() {
        let result: Result<ProgramSteps, _> = serde_json::from_str(r#"{"  ": "blank"}"#);
        assert!(result.is_err());
    }
}
