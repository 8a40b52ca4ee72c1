//! Deterministic signals read from the query text and the student profile.
//!
//! Everything here is pure: the same query and profile always produce the
//! same signals, which keeps parameter inference reproducible regardless of
//! which reasoning service picked the tool.

use crate::schema::{StudentProfile, ToolName, MAX_FLASHCARDS, MIN_FLASHCARDS};

const STRUGGLING_STEMS: &[&str] = &[
    "struggl", "confus", "frustrat", "anxious", "anxiety", "overwhelm", "stuck", "lost",
    "stress", "worried", "upset",
];
const ENGAGED_STEMS: &[&str] = &[
    "curious", "confident", "motivat", "excit", "focus", "eager", "engag", "interest",
    "enthusias",
];

const NOTES_CUES: &[&str] = &["note", "summar", "outline", "overview", "review", "organi", "recap"];
const PRACTICE_CUES: &[&str] = &[
    "flashcard", "card", "quiz", "practice", "memori", "drill", "question", "test",
];
const EXPLAIN_CUES: &[&str] = &[
    "explain", "confus", "understand", "clarify", "meaning", "mean", "stuck", "lost", "why",
];

const COUNT_NOUNS: &[&str] = &["flashcard", "card", "question", "quiz", "problem", "item", "term"];

const UNIT_WORDS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen",
];
const TENS_WORDS: &[&str] = &[
    "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const TOPIC_MARKERS: &[&str] = &[
    "explain ", "what is ", "what are ", "what's ", "understand ", " on ", " about ",
    " regarding ", " covering ",
];
const TOPIC_TERMINATORS: &[&str] = &[
    ",", "?", ".", "!", ";", " with ", " using ", " without ", " for my ", " in my ",
    " please", " because ", " so that ",
];
const LEADING_FILLER: &[&str] = &["the", "a", "an", "how", "what", "why", "me", "some", "about"];
const TRAILING_FILLER: &[&str] = &["is", "are", "works", "work", "please", "again"];

const SUBJECT_TABLE: &[(&str, &[&str])] = &[
    (
        "Biology",
        &[
            "heart", "cell", "photosynth", "dna", "gene", "evolution", "organ", "blood",
            "plant", "animal", "ecosystem", "mitosis", "meiosis", "protein", "bacteri",
            "virus", "digest", "respirat",
        ],
    ),
    (
        "History",
        &[
            "war", "revolution", "empire", "ancient", "medieval", "civiliz", "dynasty",
            "treaty", "colonial", "renaissance",
        ],
    ),
    (
        "Physics",
        &[
            "force", "gravity", "motion", "velocity", "newton", "quantum", "electric",
            "magnet", "wave", "momentum", "friction",
        ],
    ),
    (
        "Chemistry",
        &[
            "atom", "molecul", "chemical", "reaction", "acid", "element", "periodic",
            "bond", "compound", "ion",
        ],
    ),
    (
        "Mathematics",
        &[
            "algebra", "equation", "fraction", "geometry", "calculus", "derivative",
            "integral", "triangle", "probability", "polynomial", "trigonometr",
        ],
    ),
    (
        "Geography",
        &["climate", "continent", "river", "mountain", "volcano", "earthquake", "weather"],
    ),
    (
        "Literature",
        &["poem", "poetry", "novel", "shakespeare", "metaphor", "sonnet", "author"],
    ),
    (
        "Computer Science",
        &["algorithm", "programming", "computer", "recursion", "database", "software"],
    ),
];

/// Lowercased alphanumeric words of `text`.
fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn has_stem(tokens: &[String], stems: &[&str]) -> bool {
    tokens.iter().any(|t| stems.iter().any(|s| t.starts_with(*s)))
}

fn cue_score(tokens: &[String], cues: &[&str]) -> usize {
    cues.iter()
        .filter(|&&cue| tokens.iter().any(|t| t.starts_with(cue)))
        .count()
}

fn first_integer(text: &str) -> Option<i64> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

fn word_value(words: &[&str], token: &str, scale: i64, offset: i64) -> Option<i64> {
    words
        .iter()
        .position(|w| *w == token)
        .map(|i| (i as i64 + offset) * scale)
}

/// Parses the number starting at `words[0]`, returning it with the number of
/// words consumed. Handles digits, "seven", "thirty" and "twenty five".
fn parse_number(words: &[String]) -> Option<(i64, usize)> {
    let first = words.first()?;
    if let Ok(n) = first.parse() {
        return Some((n, 1));
    }
    if let Some(n) = word_value(UNIT_WORDS, first, 1, 1) {
        return Some((n, 1));
    }
    let tens = word_value(TENS_WORDS, first, 10, 2)?;
    match words.get(1).and_then(|w| word_value(UNIT_WORDS, w, 1, 1)) {
        Some(unit) if unit < 10 => Some((tens + unit, 2)),
        _ => Some((tens, 1)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionalClass {
    Struggling,
    Engaged,
    Neutral,
}

impl EmotionalClass {
    /// Struggling wins when both classes match.
    pub fn classify(summary: &str) -> Self {
        let words = tokens(summary);
        if has_stem(&words, STRUGGLING_STEMS) {
            EmotionalClass::Struggling
        } else if has_stem(&words, ENGAGED_STEMS) {
            EmotionalClass::Engaged
        } else {
            EmotionalClass::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MasteryBand {
    Low,
    Mid,
    High,
}

impl MasteryBand {
    /// "Level 4: Building foundational knowledge" -> Mid.
    pub fn from_summary(summary: &str) -> Self {
        match first_integer(summary) {
            Some(n) if n <= 3 => MasteryBand::Low,
            Some(n) if n >= 7 => MasteryBand::High,
            _ => MasteryBand::Mid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadingLevel {
    Early,
    Middle,
    Advanced,
}

impl ReadingLevel {
    pub fn from_grade(grade_level: &str) -> Self {
        if let Some(grade) = first_integer(grade_level) {
            return match grade {
                g if g <= 5 => ReadingLevel::Early,
                6..=8 => ReadingLevel::Middle,
                _ => ReadingLevel::Advanced,
            };
        }
        let words = tokens(grade_level);
        if has_stem(&words, &["kinder", "elementary", "primary"]) {
            ReadingLevel::Early
        } else if has_stem(&words, &["college", "university", "undergrad", "high", "graduate"]) {
            ReadingLevel::Advanced
        } else {
            ReadingLevel::Middle
        }
    }
}

/// Inference inputs derived from a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSignals {
    pub emotion: EmotionalClass,
    pub mastery: MasteryBand,
    pub reading_level: ReadingLevel,
    pub note_style: &'static str,
}

impl ProfileSignals {
    pub fn from_profile(profile: &StudentProfile) -> Self {
        Self {
            emotion: EmotionalClass::classify(&profile.emotional_state_summary),
            mastery: MasteryBand::from_summary(&profile.mastery_level_summary),
            reading_level: ReadingLevel::from_grade(&profile.grade_level),
            note_style: Self::note_style_for(profile.learning_style_summary.as_deref()),
        }
    }

    fn note_style_for(learning_style: Option<&str>) -> &'static str {
        let words = tokens(learning_style.unwrap_or_default());
        if has_stem(&words, &["visual", "diagram"]) {
            "outline"
        } else if has_stem(&words, &["story", "stori", "narrative", "auditory", "verbal"]) {
            "narrative"
        } else if has_stem(&words, &["list", "concise", "bullet"]) {
            "bullet_points"
        } else {
            "structured"
        }
    }

    fn effective_band(&self) -> MasteryBand {
        match self.emotion {
            EmotionalClass::Struggling => MasteryBand::Low,
            EmotionalClass::Engaged => self.mastery.max(MasteryBand::Mid),
            EmotionalClass::Neutral => self.mastery,
        }
    }

    pub fn difficulty(&self) -> &'static str {
        match self.effective_band() {
            MasteryBand::Low => "easy",
            MasteryBand::Mid => "medium",
            MasteryBand::High => "hard",
        }
    }

    pub fn depth(&self) -> &'static str {
        match self.effective_band() {
            MasteryBand::Low => "basic",
            MasteryBand::Mid => "intermediate",
            MasteryBand::High => "advanced",
        }
    }
}

/// Parameters stated explicitly in the query text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySignals {
    pub topic: Option<String>,
    pub subject: Option<String>,
    pub count: Option<i64>,
    pub difficulty: Option<&'static str>,
    pub depth: Option<&'static str>,
    pub note_style: Option<&'static str>,
    pub include_examples: Option<bool>,
    pub include_analogies: Option<bool>,
}

impl QuerySignals {
    pub fn extract(query: &str) -> Self {
        let words = tokens(query);
        Self {
            topic: Self::topic(query),
            subject: Self::subject(&words),
            count: Self::count(&words),
            difficulty: Self::difficulty(&words),
            depth: Self::depth(&words),
            note_style: Self::note_style(&words),
            include_examples: Self::toggle(&words, "example"),
            include_analogies: Self::toggle(&words, "analog"),
        }
    }

    /// Text after the earliest topic marker, cut at the first terminator.
    fn topic(query: &str) -> Option<String> {
        let lower = format!(" {}", query.to_ascii_lowercase());
        let padded = format!(" {}", query);

        let start = TOPIC_MARKERS
            .iter()
            .filter_map(|&m| lower.find(m).map(|pos| pos + m.len()))
            .min()?;

        let rest_lower = &lower[start..];
        let end = TOPIC_TERMINATORS
            .iter()
            .filter_map(|&t| rest_lower.find(t))
            .min()
            .unwrap_or(rest_lower.len());

        let mut words: Vec<&str> = padded[start..start + end].split_whitespace().collect();
        if words.ends_with(&["to", "me"]) || words.ends_with(&["for", "me"]) {
            words.truncate(words.len() - 2);
        }
        while words
            .first()
            .is_some_and(|w| LEADING_FILLER.contains(&w.to_lowercase().as_str()))
        {
            words.remove(0);
        }
        while words
            .last()
            .is_some_and(|w| TRAILING_FILLER.contains(&w.to_lowercase().as_str()))
        {
            words.pop();
        }

        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }

    /// "for my biology class" -> Biology.
    fn subject(words: &[String]) -> Option<String> {
        let pos = words.iter().position(|w| {
            matches!(w.as_str(), "class" | "course" | "exam" | "test" | "homework" | "lesson")
        })?;
        if pos < 2 || words[pos - 2] != "my" {
            return None;
        }
        let raw = &words[pos - 1];
        let mut chars = raw.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
    }

    /// A number only counts when a flashcard-like noun follows within three words.
    fn count(words: &[String]) -> Option<i64> {
        (0..words.len()).find_map(|i| {
            let (n, used) = parse_number(&words[i..])?;
            let start = i + used;
            let window = &words[start..words.len().min(start + 3)];
            window
                .iter()
                .any(|next| COUNT_NOUNS.iter().any(|&noun| next.starts_with(noun)))
                .then_some(n)
        })
    }

    fn difficulty(words: &[String]) -> Option<&'static str> {
        words.iter().enumerate().find_map(|(i, w)| match w.as_str() {
            "easy" | "simple" | "beginner" => Some("easy"),
            "medium" | "moderate" => Some("medium"),
            "hard" if words.get(i + 1).map(String::as_str) == Some("time") => None,
            "hard" | "difficult" | "challenging" | "tough" => Some("hard"),
            _ => None,
        })
    }

    fn depth(words: &[String]) -> Option<&'static str> {
        words.iter().find_map(|w| match w.as_str() {
            "basic" | "basics" | "simple" | "beginner" | "eli5" => Some("basic"),
            "intermediate" => Some("intermediate"),
            "advanced" | "detailed" | "deep" => Some("advanced"),
            "comprehensive" | "thorough" | "complete" => Some("comprehensive"),
            _ => None,
        })
    }

    fn note_style(words: &[String]) -> Option<&'static str> {
        words.iter().find_map(|w| match w.as_str() {
            "outline" | "outlined" => Some("outline"),
            "bullet" | "bullets" | "bulleted" => Some("bullet_points"),
            "narrative" | "story" => Some("narrative"),
            "structured" => Some("structured"),
            _ => None,
        })
    }

    /// `Some(false)` for "no X" / "without X", `Some(true)` for any other mention.
    fn toggle(words: &[String], stem: &str) -> Option<bool> {
        let pos = words.iter().position(|w| w.starts_with(stem))?;
        let negated = pos > 0 && matches!(words[pos - 1].as_str(), "no" | "without");
        Some(!negated)
    }
}

/// Subject guessed from topic keywords.
pub fn subject_for_topic(topic: &str) -> Option<&'static str> {
    let words = tokens(topic);
    SUBJECT_TABLE
        .iter()
        .find(|(_, stems)| has_stem(&words, stems))
        .map(|(subject, _)| *subject)
}

/// Number of schema fields the query leaves to inference for `tool`.
pub fn inferred_field_count(tool: ToolName, signals: &QuerySignals) -> usize {
    let missing = |present: bool| usize::from(!present);
    let topic = missing(signals.topic.is_some());
    let subject = missing(signals.subject.is_some());
    match tool {
        ToolName::NoteMaker => {
            topic
                + subject
                + missing(signals.note_style.is_some())
                + missing(signals.include_examples.is_some())
                + missing(signals.include_analogies.is_some())
        }
        ToolName::FlashcardGenerator => {
            topic
                + subject
                + missing(signals.count.is_some())
                + missing(signals.difficulty.is_some())
                + missing(signals.include_examples.is_some())
        }
        ToolName::ConceptExplainer => topic + subject + missing(signals.depth.is_some()),
    }
}

/// Picks one tool from lexical cues.
///
/// Ties go to the tool needing the fewest inferred parameters, then to
/// ConceptExplainer. A query with no cues at all goes to ConceptExplainer.
pub fn classify_intent(query: &str, signals: &QuerySignals) -> ToolName {
    let words = tokens(query);
    let scores = [
        (ToolName::NoteMaker, cue_score(&words, NOTES_CUES)),
        (ToolName::FlashcardGenerator, cue_score(&words, PRACTICE_CUES)),
        (ToolName::ConceptExplainer, cue_score(&words, EXPLAIN_CUES)),
    ];

    let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
    if best == 0 {
        return ToolName::ConceptExplainer;
    }

    let tied: Vec<ToolName> = scores
        .iter()
        .filter(|(_, s)| *s == best)
        .map(|(tool, _)| *tool)
        .collect();
    let fewest = tied
        .iter()
        .map(|tool| inferred_field_count(*tool, signals))
        .min()
        .unwrap_or(0);
    let finalists: Vec<ToolName> = tied
        .into_iter()
        .filter(|tool| inferred_field_count(*tool, signals) == fewest)
        .collect();

    if finalists.len() == 1 {
        finalists[0]
    } else if finalists.contains(&ToolName::ConceptExplainer) {
        ToolName::ConceptExplainer
    } else {
        finalists.first().copied().unwrap_or(ToolName::ConceptExplainer)
    }
}

/// Clamp an integer into the flashcard range.
pub fn clamp_count(count: i64) -> i64 {
    count.clamp(MIN_FLASHCARDS, MAX_FLASHCARDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::sample_profile;

    #[test]
    fn test_emotional_class() {
        assert_eq!(
            EmotionalClass::classify("Struggling and a bit frustrated"),
            EmotionalClass::Struggling
        );
        assert_eq!(EmotionalClass::classify("Curious, eager to learn"), EmotionalClass::Engaged);
        assert_eq!(EmotionalClass::classify("Tired"), EmotionalClass::Neutral);
        assert_eq!(
            EmotionalClass::classify("Motivated but confused"),
            EmotionalClass::Struggling
        );
    }

    #[test]
    fn test_profile_inference_table() {
        let mut profile = sample_profile();
        profile.emotional_state_summary = "Confused and anxious".to_string();
        let signals = ProfileSignals::from_profile(&profile);
        assert_eq!(signals.difficulty(), "easy");
        assert_eq!(signals.depth(), "basic");
        assert_eq!(signals.note_style, "structured");

        profile.emotional_state_summary = "Curious".to_string();
        profile.mastery_level_summary = "Level 2: beginner".to_string();
        let signals = ProfileSignals::from_profile(&profile);
        assert_eq!(signals.difficulty(), "medium");
        assert_eq!(signals.depth(), "intermediate");

        profile.mastery_level_summary = "Level 8: advanced".to_string();
        let signals = ProfileSignals::from_profile(&profile);
        assert_eq!(signals.difficulty(), "hard");
        assert_eq!(signals.depth(), "advanced");

        profile.emotional_state_summary = "Calm".to_string();
        profile.mastery_level_summary = "Level 1".to_string();
        assert_eq!(ProfileSignals::from_profile(&profile).difficulty(), "easy");
    }

    #[test]
    fn test_note_style_from_learning_style() {
        let mut profile = sample_profile();
        profile.learning_style_summary = Some("Visual learner, likes diagrams".to_string());
        assert_eq!(ProfileSignals::from_profile(&profile).note_style, "outline");
        profile.learning_style_summary = Some("Prefers stories".to_string());
        assert_eq!(ProfileSignals::from_profile(&profile).note_style, "narrative");
        profile.learning_style_summary = Some("Kinesthetic".to_string());
        assert_eq!(ProfileSignals::from_profile(&profile).note_style, "structured");
    }

    #[test]
    fn test_reading_level() {
        assert_eq!(ReadingLevel::from_grade("Grade 3"), ReadingLevel::Early);
        assert_eq!(ReadingLevel::from_grade("7th grade"), ReadingLevel::Middle);
        assert_eq!(ReadingLevel::from_grade("11"), ReadingLevel::Advanced);
        assert_eq!(ReadingLevel::from_grade("College freshman"), ReadingLevel::Advanced);
        assert_eq!(ReadingLevel::from_grade("unknown"), ReadingLevel::Middle);
    }

    #[test]
    fn test_extract_outline_notes_query() {
        let signals = QuerySignals::extract(
            "Can you make me some outline-style notes on the causes of World War II, with analogies",
        );
        assert_eq!(signals.topic.as_deref(), Some("causes of World War II"));
        assert_eq!(signals.note_style, Some("outline"));
        assert_eq!(signals.include_analogies, Some(true));
        assert_eq!(signals.count, None);
    }

    #[test]
    fn test_extract_flashcard_query() {
        let signals = QuerySignals::extract("Make 5 flashcards on the human heart");
        assert_eq!(signals.topic.as_deref(), Some("human heart"));
        assert_eq!(signals.count, Some(5));
        assert_eq!(signals.difficulty, None);

        let signals = QuerySignals::extract("give me ten hard practice questions about algebra");
        assert_eq!(signals.count, Some(10));
        assert_eq!(signals.difficulty, Some("hard"));
        assert_eq!(signals.topic.as_deref(), Some("algebra"));
    }

    #[test]
    fn test_extract_compound_number_words() {
        assert_eq!(QuerySignals::extract("thirty flashcards on cells").count, Some(30));
        assert_eq!(
            QuerySignals::extract("Give me twenty five quiz questions about fractions").count,
            Some(25)
        );
        assert_eq!(QuerySignals::extract("forty-two cards on atoms").count, Some(42));
        assert_eq!(QuerySignals::extract("twelve flashcards").count, Some(12));
    }

    #[test]
    fn test_extract_ignores_hard_time_and_unrelated_numbers() {
        let signals = QuerySignals::extract("I'm having a hard time with World War 2");
        assert_eq!(signals.difficulty, None);
        assert_eq!(signals.count, None);
    }

    #[test]
    fn test_extract_explain_query() {
        let signals = QuerySignals::extract("Can you explain the water cycle to me?");
        assert_eq!(signals.topic.as_deref(), Some("water cycle"));

        let signals = QuerySignals::extract("I'm confused about photosynthesis");
        assert_eq!(signals.topic.as_deref(), Some("photosynthesis"));
    }

    #[test]
    fn test_extract_subject_and_toggles() {
        let signals =
            QuerySignals::extract("notes on mitosis for my biology class, without examples");
        assert_eq!(signals.subject.as_deref(), Some("Biology"));
        assert_eq!(signals.include_examples, Some(false));
        assert_eq!(signals.topic.as_deref(), Some("mitosis"));
    }

    #[test]
    fn test_subject_for_topic() {
        assert_eq!(subject_for_topic("human heart"), Some("Biology"));
        assert_eq!(subject_for_topic("causes of World War II"), Some("History"));
        assert_eq!(subject_for_topic("the meaning of friendship"), None);
    }

    #[test]
    fn test_classify_intent() {
        let q = "Can you make me some outline-style notes on the causes of World War II";
        assert_eq!(classify_intent(q, &QuerySignals::extract(q)), ToolName::NoteMaker);

        let q = "Make 5 flashcards on the human heart";
        assert_eq!(classify_intent(q, &QuerySignals::extract(q)), ToolName::FlashcardGenerator);

        let q = "I don't understand photosynthesis";
        assert_eq!(classify_intent(q, &QuerySignals::extract(q)), ToolName::ConceptExplainer);

        let q = "photosynthesis";
        assert_eq!(classify_intent(q, &QuerySignals::extract(q)), ToolName::ConceptExplainer);
    }

    #[test]
    fn test_classify_tie_prefers_fewest_inferred_fields() {
        // One notes cue and one explain cue: the explainer needs fewer inferred fields.
        let q = "review why the heart beats";
        assert_eq!(classify_intent(q, &QuerySignals::extract(q)), ToolName::ConceptExplainer);
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(0), 1);
        assert_eq!(clamp_count(50), 20);
        assert_eq!(clamp_count(7), 7);
    }
}
