//! Rule-based noun lemmatizer.
//!
//! Reduces plural nouns to their singular dictionary form with a small table of
//! irregular plurals and suffix rules. Applying it to its own output is a no-op.

use std::{borrow::Cow, collections::HashSet};

const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("halves", "half"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("men", "man"),
    ("mice", "mouse"),
    ("people", "person"),
    ("shelves", "shelf"),
    ("teeth", "tooth"),
    ("wives", "wife"),
    ("wolves", "wolf"),
    ("women", "woman"),
];

/// Words ending in `s` that are not plurals.
const INVARIANT: &[&str] = &[
    "aerobics",
    "afterwards",
    "alias",
    "always",
    "atlas",
    "besides",
    "bias",
    "canvas",
    "chaos",
    "christmas",
    "cosmos",
    "downwards",
    "economics",
    "electronics",
    "ethos",
    "gymnastics",
    "kudos",
    "lens",
    "logos",
    "mathematics",
    "news",
    "overseas",
    "pancreas",
    "perhaps",
    "physics",
    "rhinoceros",
    "series",
    "sometimes",
    "species",
    "thanks",
    "thermos",
    "towards",
    "upwards",
    "whereas",
    "yes",
];

/// Nouns whose singular ends in `ie`; their plurals only lose the `s`.
const IE_NOUNS: &[&str] = &[
    "auntie",
    "beanie",
    "birdie",
    "bootie",
    "brownie",
    "budgie",
    "calorie",
    "collie",
    "cookie",
    "freebie",
    "genie",
    "goalie",
    "hippie",
    "hoodie",
    "magpie",
    "movie",
    "necktie",
    "prairie",
    "rookie",
    "selfie",
    "smoothie",
    "sortie",
    "sweetie",
    "veggie",
    "zombie",
];

fn irregular(lower: &str) -> Option<&'static str> {
    IRREGULAR
        .iter()
        .find(|(plural, _)| *plural == lower)
        .map(|(_, singular)| *singular)
}

#[derive(Debug, Clone)]
pub struct Lemmatizer {
    /// Function words are returned untouched (`does` must not become `doe`).
    protected: HashSet<String>,
}

impl Lemmatizer {
    pub fn new<I, S>(protected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: protected.into_iter().map(Into::into).collect(),
        }
    }

    /// Base form of a single ASCII token; case of the kept prefix is preserved.
    pub fn lemmatize<'a>(&self, token: &'a str) -> Cow<'a, str> {
        let lower = token.to_ascii_lowercase();
        if !lower.is_ascii() || self.protected.contains(&lower) {
            return Cow::Borrowed(token);
        }
        if let Some(base) = irregular(&lower) {
            return Cow::Owned(base.to_string());
        }
        if lower.len() <= 3 || INVARIANT.contains(&lower.as_str()) {
            return Cow::Borrowed(token);
        }

        if lower.ends_with("ies") && lower.len() > 4 {
            let singular = &lower[..lower.len() - 1];
            if IE_NOUNS.contains(&singular) {
                return Cow::Owned(token[..token.len() - 1].to_string());
            }
            return Cow::Owned(format!("{}y", &token[..token.len() - 3]));
        }
        let strip = if ["sses", "xes", "zzes", "ches", "shes"]
            .iter()
            .any(|suffix| lower.ends_with(suffix))
        {
            2
        } else if lower.ends_with('s') && !["ss", "us", "is"].iter().any(|s| lower.ends_with(s)) {
            1
        } else {
            0
        };
        if strip == 0 {
            return Cow::Borrowed(token);
        }
        let base = &token[..token.len() - strip];
        // "mens" strips to "men", which is itself a plural
        match irregular(&base.to_ascii_lowercase()) {
            Some(singular) => Cow::Owned(singular.to_string()),
            None => Cow::Owned(base.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemmatizer() -> Lemmatizer {
        Lemmatizer::new(["does", "this", "its"])
    }

    #[test]
    fn reduces_regular_plurals() {
        let l = lemmatizer();
        assert_eq!(l.lemmatize("batteries"), "battery");
        assert_eq!(l.lemmatize("boxes"), "box");
        assert_eq!(l.lemmatize("glasses"), "glass");
        assert_eq!(l.lemmatize("watches"), "watch");
        assert_eq!(l.lemmatize("works"), "work");
        assert_eq!(l.lemmatize("Cables"), "Cable");
        assert_eq!(l.lemmatize("movies"), "movie");
        assert_eq!(l.lemmatize("cookies"), "cookie");
        assert_eq!(l.lemmatize("Selfies"), "Selfie");
        assert_eq!(l.lemmatize("hoodies"), "hoodie");
        assert_eq!(l.lemmatize("ties"), "tie");
    }

    #[test]
    fn leaves_non_plurals_alone() {
        let l = lemmatizer();
        for word in [
            "glass", "bus", "basis", "does", "this", "always", "box", "it", "christmas", "canvas",
            "atlas", "chaos", "physics", "movie",
        ] {
            assert_eq!(l.lemmatize(word), word);
        }
    }

    #[test]
    fn irregular_table_wins() {
        let l = lemmatizer();
        assert_eq!(l.lemmatize("children"), "child");
        assert_eq!(l.lemmatize("Teeth"), "tooth");
    }

    #[test]
    fn lemmatizing_twice_changes_nothing() {
        let l = lemmatizer();
        for word in [
            "batteries", "boxes", "glasses", "knives", "screws", "quizzes", "mens", "movies",
            "zombies",
        ] {
            let once = l.lemmatize(word).into_owned();
            assert_eq!(l.lemmatize(&once), once);
        }
    }
}
