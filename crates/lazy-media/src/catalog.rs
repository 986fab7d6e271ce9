//! Fixed category-to-photo tables.
//!
//! Entries store host-relative photo identifiers plus the rendition size for
//! their slot; the resolver turns them into full locators against whatever
//! host is configured.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A catalog entry: key, photo identifier, rendition width and height.
pub type CatalogEntry = (&'static str, &'static str, u32, u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSection {
    Hero,
    Internships,
    Courses,
    About,
    Training,
}

const HERO: &[CatalogEntry] = &[
    ("home", "photo-1522071820081-009f0129c71c", 1920, 1080),
    ("internships", "photo-1498050108023-c5249f4df085", 1920, 600),
    ("courses", "photo-1516321318423-f06f85e504b3", 1920, 600),
    ("about", "photo-1497366216548-37526070297c", 1920, 600),
    ("training", "photo-1552664730-d307ca884978", 1920, 600),
    ("contact", "photo-1423666639041-f56000c27a9a", 1920, 600),
];

const INTERNSHIPS: &[CatalogEntry] = &[
    ("Software Development", "photo-1498050108023-c5249f4df085", 800, 500),
    ("UI/UX Design", "photo-1561070791-2526d30994b5", 800, 500),
    ("Digital Marketing", "photo-1460925895917-afdab827c52f", 800, 500),
    ("Data Science", "photo-1551288049-bebda4e38f71", 800, 500),
    ("Business Development", "photo-1454165804606-c3d57bc86b40", 800, 500),
    ("Content Writing", "photo-1455390582262-044cdead277a", 800, 500),
];

const COURSES: &[CatalogEntry] = &[
    ("Programming", "photo-1517694712202-14dd9538aa97", 800, 400),
    ("Design", "photo-1626785774573-4b799315345d", 800, 400),
    ("Business", "photo-1454165804606-c3d57bc86b40", 800, 400),
    ("Data", "photo-1551288049-bebda4e38f71", 800, 400),
    ("Marketing", "photo-1533750349088-cd871a92f312", 800, 400),
];

const ABOUT: &[CatalogEntry] = &[
    ("team", "photo-1522071820081-009f0129c71c", 1200, 800),
    ("office", "photo-1497366216548-37526070297c", 1200, 800),
    ("innovation", "photo-1519389950473-47ba0277781c", 1200, 800),
];

const TRAINING: &[CatalogEntry] = &[
    ("application", "photo-1586281380349-632531db7ed4", 600, 400),
    ("assessment", "photo-1434030216411-0b793f4b4173", 600, 400),
    ("training", "photo-1524178232363-1fb2b075b655", 600, 400),
    ("project", "photo-1531482615713-2afd69097998", 600, 400),
    ("certification", "photo-1523050854058-8df90110c9f1", 600, 400),
];

/// Keywords tested against course category names, in priority order,
/// paired with the course entry they select.
pub const COURSE_KEYWORDS: [(&str, &str); 5] = [
    ("program", "Programming"),
    ("design", "Design"),
    ("business", "Business"),
    ("data", "Data"),
    ("market", "Marketing"),
];

impl CatalogSection {
    pub const ALL: [CatalogSection; 5] = [
        CatalogSection::Hero,
        CatalogSection::Internships,
        CatalogSection::Courses,
        CatalogSection::About,
        CatalogSection::Training,
    ];

    pub fn entries(self) -> &'static [CatalogEntry] {
        match self {
            CatalogSection::Hero => HERO,
            CatalogSection::Internships => INTERNSHIPS,
            CatalogSection::Courses => COURSES,
            CatalogSection::About => ABOUT,
            CatalogSection::Training => TRAINING,
        }
    }

    /// Exact, case-sensitive key lookup.
    pub fn lookup(self, key: &str) -> Option<&'static CatalogEntry> {
        self.entries().iter().find(|(k, _, _, _)| *k == key)
    }

    pub fn keys(self) -> impl Iterator<Item = &'static str> {
        self.entries().iter().map(|(k, _, _, _)| *k)
    }

    pub fn name(self) -> &'static str {
        match self {
            CatalogSection::Hero => "hero",
            CatalogSection::Internships => "internships",
            CatalogSection::Courses => "courses",
            CatalogSection::About => "about",
            CatalogSection::Training => "training",
        }
    }
}

impl fmt::Display for CatalogSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CatalogSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CatalogSection::ALL
            .into_iter()
            .find(|section| section.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("Unknown catalog section '{s}'. Use hero, internships, courses, about or training.")
            })
    }
}

/// Course entry key selected by the first keyword contained in `category`.
pub fn course_key_for(category: &str) -> Option<&'static str> {
    let lowered = category.to_lowercase();
    COURSE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, key)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        let entry = CatalogSection::Internships.lookup("Data Science").unwrap();
        assert_eq!(entry.1, "photo-1551288049-bebda4e38f71");
        assert!(CatalogSection::Internships.lookup("data science").is_none());
    }

    #[test]
    fn test_course_keyword_priority() {
        assert_eq!(course_key_for("Advanced Programming"), Some("Programming"));
        // "design" outranks "data" when both appear
        assert_eq!(course_key_for("Data-Driven DESIGN"), Some("Design"));
        assert_eq!(course_key_for("Marketplace Economics"), Some("Marketing"));
        assert_eq!(course_key_for("Pottery"), None);
    }

    #[test]
    fn test_every_course_keyword_has_entry() {
        for (_, key) in COURSE_KEYWORDS {
            assert!(CatalogSection::Courses.lookup(key).is_some(), "{key}");
        }
    }

    #[test]
    fn test_section_parse() {
        assert_eq!("Hero".parse::<CatalogSection>().unwrap(), CatalogSection::Hero);
        assert!("gallery".parse::<CatalogSection>().is_err());
    }
}
