//! Structured-output descriptors handed to the generation backend.
//!
//! These serialize to the OpenAPI subset Gemini accepts as `responseSchema`
//! (`type` in upper case, `properties`, `required`, `items`, `description`).
//! `propertyOrdering` keeps the fields in declaration order in the model output.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
  String,
  Boolean,
  Integer,
  Array,
  Object,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
  #[serde(rename = "type")]
  pub kind: SchemaType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub items: Option<Box<Schema>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub properties: Option<BTreeMap<&'static str, Schema>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub property_ordering: Option<Vec<&'static str>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub required: Option<Vec<&'static str>>,
}

impl Schema {
  fn scalar(kind: SchemaType) -> Self {
    Self { kind, description: None, items: None, properties: None, property_ordering: None, required: None }
  }

  pub fn string() -> Self { Self::scalar(SchemaType::String) }
  pub fn boolean() -> Self { Self::scalar(SchemaType::Boolean) }
  pub fn integer() -> Self { Self::scalar(SchemaType::Integer) }

  pub fn array(items: Schema) -> Self {
    Self { items: Some(Box::new(items)), ..Self::scalar(SchemaType::Array) }
  }

  /// Object with ordered properties; `required` lists the mandatory ones.
  pub fn object(props: Vec<(&'static str, Schema)>, required: &[&'static str]) -> Self {
    let ordering = props.iter().map(|(k, _)| *k).collect();
    Self {
      properties: Some(props.into_iter().collect()),
      property_ordering: Some(ordering),
      required: Some(required.to_vec()),
      ..Self::scalar(SchemaType::Object)
    }
  }

  pub fn describe(mut self, text: &'static str) -> Self {
    self.description = Some(text);
    self
  }

  /// Is `field` declared mandatory on this object?
  #[cfg(test)]
  pub fn requires(&self, field: &str) -> bool {
    self.required.as_ref().is_some_and(|r| r.iter().any(|f| *f == field))
  }
}

/// Batch of sentences, each with exactly one grammatical error.
pub fn grammar_spotter() -> Schema {
  Schema::array(Schema::object(
    vec![
      ("sentence", Schema::string()),
      ("incorrectWord", Schema::string()),
      ("correctWord", Schema::string()),
      ("explanation", Schema::string()),
    ],
    &["sentence", "incorrectWord", "correctWord", "explanation"],
  ))
}

/// Batch of fill-in-the-blank items. Shared by Grammar Fill, Preposition Drop and the maze.
pub fn grammar_fill() -> Schema {
  Schema::array(Schema::object(
    vec![
      ("sentence", Schema::string().describe("Sentence with '__BLANK__' as a placeholder.")),
      ("options", Schema::array(Schema::string())),
      ("answer", Schema::string()),
      ("explanation", Schema::string()),
    ],
    &["sentence", "options", "answer", "explanation"],
  ))
}

pub fn dialogue() -> Schema {
  Schema::object(
    vec![
      ("scenario", Schema::string()),
      (
        "lines",
        Schema::array(Schema::object(
          vec![
            ("id", Schema::integer()),
            ("speaker", Schema::string()),
            ("line", Schema::string()),
          ],
          &["id", "speaker", "line"],
        )),
      ),
    ],
    &["scenario", "lines"],
  )
}

pub fn emoji_question() -> Schema {
  Schema::object(
    vec![(
      "emojis",
      Schema::string()
        .describe("A sequence of 3-5 emojis that can be formed into a grammatically correct sentence."),
    )],
    &["emojis"],
  )
}

pub fn sentence_validation() -> Schema {
  Schema::object(
    vec![
      (
        "isCorrect",
        Schema::boolean()
          .describe("True if the sentence is grammatically correct AND accurately represents the emojis."),
      ),
      (
        "feedback",
        Schema::string().describe(
          "A concise, encouraging explanation for the user. If incorrect, explain the grammar error or how it doesn't match the emojis. If correct, praise the user and explain why it's a good sentence.",
        ),
      ),
      (
        "correctExample",
        Schema::string().describe(
          "If the user's sentence is incorrect, provide one example of a correct sentence that fits the emojis. Omit this field if the user's sentence is correct.",
        ),
      ),
    ],
    &["isCorrect", "feedback"],
  )
}

/// Tiny payload for the diagnostic connection probe.
pub fn connection_probe() -> Schema {
  Schema::object(vec![("reply", Schema::string())], &["reply"])
}
