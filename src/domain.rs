//! Domain models: emoji categories, generated question records, validation verdicts.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Highest level in every category. Levels run `1..=MAX_LEVELS`.
pub const MAX_LEVELS: u32 = 5;
/// Points awarded the first time a level is completed.
pub const POINTS_PER_LEVEL: u32 = 10;
/// Hint allowance per category. Hints are counted in progress but not spent by the game yet.
pub const HINTS_PER_CATEGORY: u32 = 3;
/// Batch size for the question-set games.
pub const TOTAL_QUESTIONS_PER_GAME: usize = 5;
/// The maze is three batches long.
pub const MAZE_QUESTIONS: usize = TOTAL_QUESTIONS_PER_GAME * 3;

/// Emoji game categories. The serialized names double as progress map keys.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CategoryId {
  Tenses,
  PartsOfSpeech,
  Punctuation,
  IdiomsAndPhrases,
  SentenceStructures,
}

impl CategoryId {
  pub const ALL: [CategoryId; 5] = [
    CategoryId::Tenses,
    CategoryId::PartsOfSpeech,
    CategoryId::Punctuation,
    CategoryId::IdiomsAndPhrases,
    CategoryId::SentenceStructures,
  ];

  pub fn info(self) -> &'static CategoryInfo {
    // CATEGORIES is declared in the same order as ALL.
    &CATEGORIES[self as usize]
  }

  pub fn as_str(self) -> &'static str {
    match self {
      CategoryId::Tenses => "Tenses",
      CategoryId::PartsOfSpeech => "PartsOfSpeech",
      CategoryId::Punctuation => "Punctuation",
      CategoryId::IdiomsAndPhrases => "IdiomsAndPhrases",
      CategoryId::SentenceStructures => "SentenceStructures",
    }
  }
}

impl std::fmt::Display for CategoryId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Static description of a category card.
#[derive(Debug, Serialize)]
pub struct CategoryInfo {
  pub id: CategoryId,
  pub title: &'static str,
  pub emoji: &'static str,
  pub description: &'static str,
  /// Fragment spliced into the emoji puzzle prompt.
  #[serde(skip)]
  pub prompt: &'static str,
}

pub static CATEGORIES: [CategoryInfo; 5] = [
  CategoryInfo {
    id: CategoryId::Tenses,
    title: "Tenses",
    emoji: "🕒",
    description: "Past, present, future. Master the timeline of actions.",
    prompt: "Create an emoji puzzle representing a specific English verb tense (e.g., past simple, present continuous, future perfect).",
  },
  CategoryInfo {
    id: CategoryId::PartsOfSpeech,
    title: "Parts of Speech",
    emoji: "🧩",
    description: "Nouns, verbs, adjectives... The building blocks of language.",
    prompt: "Create an emoji puzzle representing a specific part of speech (noun, verb, adjective, adverb, pronoun, preposition, conjunction, interjection).",
  },
  CategoryInfo {
    id: CategoryId::Punctuation,
    title: "Punctuation",
    emoji: "📍",
    description: "Commas, periods, question marks. The traffic signs of writing.",
    prompt: "Create an emoji puzzle representing a specific punctuation mark or its usage.",
  },
  CategoryInfo {
    id: CategoryId::IdiomsAndPhrases,
    title: "Idioms & Phrases",
    emoji: "🗣️",
    description: "Raining cats and dogs? Break a leg! Understand quirky expressions.",
    prompt: "Create an emoji puzzle representing a common English idiom or phrase.",
  },
  CategoryInfo {
    id: CategoryId::SentenceStructures,
    title: "Sentence Structures",
    emoji: "🏗️",
    description: "Simple, compound, complex. Build better sentences.",
    prompt: "Create an emoji puzzle representing a type of sentence structure (simple, compound, complex) or a grammatical concept like subject-verb agreement.",
  },
];

// --- Generated content records (field names follow the model's JSON) ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrammarSpotterQuestion {
  pub sentence: String,
  pub incorrect_word: String,
  pub correct_word: String,
  pub explanation: String,
}

/// Fill-in-the-blank item; `sentence` carries a `__BLANK__` placeholder.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GrammarFillQuestion {
  pub sentence: String,
  pub options: Vec<String>,
  pub answer: String,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DialogueLine {
  pub id: u32,
  pub speaker: String,
  pub line: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dialogue {
  pub scenario: String,
  pub lines: Vec<DialogueLine>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmojiQuestion {
  pub emojis: String,
}

/// Verdict for one submitted sentence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
  pub is_correct: bool,
  pub feedback: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correct_example: Option<String>,
}

impl ValidationResult {
  /// `correct_example` only accompanies incorrect verdicts; blank examples count as absent.
  pub fn normalized(mut self) -> Self {
    if self.is_correct {
      self.correct_example = None;
    } else {
      self.correct_example = crate::util::non_blank(self.correct_example);
    }
    self
  }
}

/// Dialogue Builder payload: lines in shuffled order plus the id order that solves it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrambledDialogue {
  pub scenario: String,
  pub lines: Vec<DialogueLine>,
  pub solution: Vec<u32>,
}

impl ScrambledDialogue {
  /// Line ids must be unique for the solution order to mean anything; when the
  /// model repeats one, lines are renumbered `1..=n` in their spoken order.
  pub fn from_dialogue(d: Dialogue) -> Self {
    let mut lines = d.lines;
    let mut seen = std::collections::HashSet::new();
    if !lines.iter().all(|l| seen.insert(l.id)) {
      for (line, id) in lines.iter_mut().zip(1..) {
        line.id = id;
      }
    }
    let solution: Vec<u32> = lines.iter().map(|l| l.id).collect();
    let mut rng = rand::thread_rng();
    lines.shuffle(&mut rng);
    // A shuffle that lands on the solution is no puzzle.
    if lines.len() > 1 && lines.iter().map(|l| l.id).eq(solution.iter().copied()) {
      lines.rotate_left(1);
    }
    Self { scenario: d.scenario, lines, solution }
  }
}
