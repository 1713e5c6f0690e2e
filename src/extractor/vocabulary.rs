//! Keyword vocabularies used by the keyword extractors
//!
//! Each entry maps a canonical label to the surface forms that signal it.
//! Matching is case-insensitive and respects word boundaries, so "pop" does
//! not fire on "popular". Overlapping forms resolve longest first: "rhythm
//! and blues" is R&B only, not also blues.

use regex::Regex;
use std::cmp::Reverse;
use std::ops::Range;
use std::sync::LazyLock;

pub struct Vocabulary {
    entries: Vec<(&'static str, Regex)>,
}

impl Vocabulary {
    fn new(entries: &[(&'static str, &[&str])]) -> Self {
        let entries = entries
            .iter()
            .map(|(label, forms)| {
                let mut forms = forms.to_vec();
                // Leftmost-first alternation must try the longest form first
                forms.sort_by_key(|f| Reverse(f.len()));
                let alternation = forms
                    .iter()
                    .map(|f| regex::escape(f).replace(' ', r"\s+"))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = format!(r"(?i)\b(?:{alternation})\b");
                let regex = Regex::new(&pattern).expect("vocabulary patterns are escaped literals");
                (*label, regex)
            })
            .collect();
        Self { entries }
    }

    /// Labels whose forms appear in `text`, in declaration order.
    ///
    /// Every occurrence claims its span, longest first; an occurrence that
    /// overlaps an already claimed span does not count.
    pub fn matches(&self, text: &str) -> Vec<&'static str> {
        let mut spans: Vec<(usize, Range<usize>)> = self
            .entries
            .iter()
            .enumerate()
            .flat_map(|(index, (_, re))| re.find_iter(text).map(move |m| (index, m.range())))
            .collect();
        spans.sort_by_key(|(_, span)| (Reverse(span.len()), span.start));

        let mut claimed: Vec<Range<usize>> = Vec::new();
        let mut hit = vec![false; self.entries.len()];
        for (index, span) in spans {
            if claimed
                .iter()
                .all(|c| c.end <= span.start || span.end <= c.start)
            {
                claimed.push(span);
                hit[index] = true;
            }
        }

        self.entries
            .iter()
            .zip(hit)
            .filter(|(_, hit)| *hit)
            .map(|((label, _), _)| *label)
            .collect()
    }

    /// First matching label in declaration order.
    pub fn first(&self, text: &str) -> Option<&'static str> {
        self.matches(text).into_iter().next()
    }

    pub fn any(&self, text: &str) -> bool {
        self.entries.iter().any(|(_, re)| re.is_match(text))
    }
}

pub static GENRES: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[
        ("jazz", &["jazz", "bebop", "swing"]),
        ("classical", &["classical", "orchestral", "baroque"]),
        ("rock", &["rock", "rock and roll", "rock n roll"]),
        ("pop", &["pop"]),
        ("hip hop", &["hip hop", "hip-hop", "hiphop", "rap"]),
        ("blues", &["blues"]),
        ("folk", &["folk"]),
        ("electronic", &["electronic", "edm", "techno", "house music"]),
        ("reggae", &["reggae"]),
        ("country", &["country music", "country", "bluegrass"]),
        ("r&b", &["r&b", "rnb", "rhythm and blues"]),
        ("soul", &["soul"]),
        ("funk", &["funk", "funky"]),
        ("disco", &["disco"]),
        ("punk", &["punk"]),
        ("metal", &["metal", "heavy metal"]),
    ])
});

pub static GENRE_INTEREST: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[(
        "genre",
        &["genre", "genres", "music", "style", "styles", "mashup", "mashups"],
    )])
});

pub static LEARNING_OBJECTIVES: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[
        (
            "teaching",
            &[
                "teach", "teaching", "learn", "learning", "education", "educational",
                "class", "classes", "classroom", "student", "students", "lesson", "lessons",
            ],
        ),
        (
            "music_theory",
            &["theory", "concept", "concepts", "fundamental", "fundamentals"],
        ),
    ])
});

pub static TARGET_AUDIENCE: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[
        ("higher_education", &["high school", "college", "university", "undergraduate"]),
        ("k12", &["elementary", "middle school", "kids", "children", "primary school"]),
    ])
});

pub static SKILL_LEVELS: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[
        ("beginner", &["beginner", "beginners", "basic", "basics", "novice", "novices"]),
        ("intermediate", &["intermediate", "moderate"]),
        ("advanced", &["advanced", "expert", "experts", "complex"]),
    ])
});

pub static THEORY_CONCEPTS: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[
        ("rhythm", &["rhythm", "rhythms", "rhythmic"]),
        ("melody", &["melody", "melodies", "melodic"]),
        ("harmony", &["harmony", "harmonies", "harmonic"]),
        ("chord", &["chord", "chords"]),
        ("scale", &["scale", "scales"]),
        ("tempo", &["tempo"]),
        ("dynamics", &["dynamics"]),
    ])
});

pub static CULTURAL_FOCUS: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[
        ("culture", &["culture", "cultures", "cultural"]),
        ("tradition", &["tradition", "traditions", "traditional"]),
        ("heritage", &["heritage"]),
        ("history", &["history", "historical"]),
        ("origin", &["origin", "origins"]),
        ("background", &["background"]),
    ])
});

pub static CULTURAL_SENSITIVITY: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[(
        "sensitive",
        &[
            "respect", "respectful", "sensitive", "sensitivity", "authentic",
            "appropriation",
        ],
    )])
});

pub static CONFIRMATION: LazyLock<Vocabulary> = LazyLock::new(|| {
    Vocabulary::new(&[(
        "confirm",
        &["yes", "confirm", "confirmed", "proceed", "ready", "go ahead", "generate"],
    )])
});
