//! Built-in Primary 6 English curriculum

/// One lesson within a unit
#[derive(Debug, PartialEq, Eq)]
pub struct Lesson {
    pub id: u32,
    pub title: &'static str,
    pub vocabulary: &'static [&'static str],
}

/// A curriculum unit
#[derive(Debug, PartialEq, Eq)]
pub struct Unit {
    pub id: u32,
    pub title: &'static str,
    /// Target grammar point
    pub language: &'static str,
    pub life_skills: &'static [&'static str],
    pub values: &'static [&'static str],
    pub lessons: &'static [Lesson],
}

impl Unit {
    /// Look up a lesson by id
    #[must_use]
    pub fn lesson(&self, id: u32) -> Option<&'static Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }
}

/// Look up a unit by id
#[must_use]
pub fn find_unit(id: u32) -> Option<&'static Unit> {
    CURRICULUM.iter().find(|u| u.id == id)
}

/// All units in teaching order
pub static CURRICULUM: &[Unit] = &[
    Unit {
        id: 1,
        title: "Amazing places in Egypt",
        language: "Present Simple",
        life_skills: &["Time Management", "Manage Household Tasks"],
        values: &["Cooperation", "Citizenship"],
        lessons: &[
            Lesson {
                id: 1,
                title: "Cultural Sites",
                vocabulary: &["buy souvenirs", "make furniture", "play music", "walk to a small museum"],
            },
            Lesson {
                id: 2,
                title: "Exploring History",
                vocabulary: &["visit ancient sites", "take photos", "landscape", "marine life"],
            },
            Lesson {
                id: 3,
                title: "Nature Wonders",
                vocabulary: &["coral reefs", "snorkel", "coastal area", "protected site"],
            },
            Lesson {
                id: 4,
                title: "Daily Life in Egypt",
                vocabulary: &["routine", "traditions", "neighborhood", "community"],
            },
            Lesson {
                id: 5,
                title: "Unit Review & Project",
                vocabulary: &["poster", "governorates", "summary", "reflection"],
            },
        ],
    },
    Unit {
        id: 2,
        title: "Our Nature",
        language: "Present Continuous Tense",
        life_skills: &["Critical Thinking", "Adaptability"],
        values: &["Environmental Awareness", "Respect for nature"],
        lessons: &[
            Lesson {
                id: 1,
                title: "Gardening Skills",
                vocabulary: &["natural fertilizer", "weeds", "hibiscus", "basil"],
            },
            Lesson {
                id: 2,
                title: "Caring for Plants",
                vocabulary: &["pull out", "water", "care for", "grow", "flavor"],
            },
            Lesson {
                id: 3,
                title: "Wildlife Habitats",
                vocabulary: &["habitat", "environment", "survive", "shore", "rare"],
            },
            Lesson {
                id: 4,
                title: "Nature's Balance",
                vocabulary: &["relax", "lay", "guide", "climate", "ecosystem"],
            },
            Lesson {
                id: 5,
                title: "Unit Review & Project",
                vocabulary: &["fact card", "Egyptian animal", "summary", "observation"],
            },
        ],
    },
    Unit {
        id: 3,
        title: "Community Builders",
        language: "Modal Verbs (can, can't, able to)",
        life_skills: &["Teamwork", "Empathy"],
        values: &["Civic Duty", "Responsibility"],
        lessons: &[
            Lesson {
                id: 1,
                title: "Health & Technical Jobs",
                vocabulary: &["paramedic", "architect", "water engineer", "mechanic"],
            },
            Lesson {
                id: 2,
                title: "Creative & Service Jobs",
                vocabulary: &["tailor", "delivery worker", "street cleaner", "traffic officer"],
            },
            Lesson {
                id: 3,
                title: "Community Research",
                vocabulary: &["community", "research", "vehicle", "emergency", "brave"],
            },
            Lesson {
                id: 4,
                title: "Feelings & Actions",
                vocabulary: &["control", "creature", "unpleasant", "refreshed", "bright", "embarrassed"],
            },
            Lesson {
                id: 5,
                title: "Unit Review & Project",
                vocabulary: &["community problem", "poster", "hero", "solution"],
            },
        ],
    },
    Unit {
        id: 4,
        title: "Resources Around Us",
        language: "Modal Verbs (should/shouldn't, must/mustn't)",
        life_skills: &["Research", "Problem Solving"],
        values: &["Environmental awareness"],
        lessons: &[
            Lesson {
                id: 1,
                title: "Modern Resources",
                vocabulary: &["material", "survive", "ancient", "decorate", "wrapped", "modern"],
            },
            Lesson {
                id: 2,
                title: "Energy & Climate",
                vocabulary: &["solar panels", "pollute", "careful", "harm", "waste", "climate", "protect"],
            },
            Lesson {
                id: 3,
                title: "Ancient Materials",
                vocabulary: &["papyrus", "bricks", "gold", "granite", "clay", "colored stones"],
            },
            Lesson {
                id: 4,
                title: "Artifacts & Nature",
                vocabulary: &["amulet", "temple", "linen", "habitats", "beak", "beach"],
            },
            Lesson {
                id: 5,
                title: "Unit Review & Project",
                vocabulary: &["fact file", "conservation", "energy project", "recycling"],
            },
        ],
    },
    Unit {
        id: 5,
        title: "Made in Egypt",
        language: "Past Simple Tense",
        life_skills: &["Organization", "Team work"],
        values: &["Pride in heritage", "Exploration"],
        lessons: &[
            Lesson {
                id: 1,
                title: "Travel Prep",
                vocabulary: &["passport", "luggage", "souvenir", "brochure", "travel plan"],
            },
            Lesson {
                id: 2,
                title: "The Museum Visit",
                vocabulary: &["exhibition", "guided tour", "information desk", "pack", "board", "mummy"],
            },
            Lesson {
                id: 3,
                title: "Ancient Wisdom",
                vocabulary: &["entrance", "active displays", "cable car", "wisdom", "unite"],
            },
            Lesson {
                id: 4,
                title: "Strength & Unity",
                vocabulary: &["strength", "bundle", "argued", "sustainable", "history"],
            },
            Lesson {
                id: 5,
                title: "Unit Review & Project",
                vocabulary: &["display board", "GEM museum", "heritage", "storytelling"],
            },
        ],
    },
    Unit {
        id: 6,
        title: "Water Savers",
        language: "Imperatives / Giving Advice",
        life_skills: &["Imagination", "Self-reflection"],
        values: &["Being a good citizen", "Working together"],
        lessons: &[
            Lesson {
                id: 1,
                title: "Water Leaks",
                vocabulary: &["drip", "overflow", "puddles", "leak"],
            },
            Lesson {
                id: 2,
                title: "Plumbing Basics",
                vocabulary: &["hallway", "hose", "tap", "pipe"],
            },
            Lesson {
                id: 3,
                title: "Water Conservation",
                vocabulary: &["save", "conserve", "utility", "resource"],
            },
            Lesson {
                id: 4,
                title: "The Water Cycle",
                vocabulary: &["rain", "evaporation", "cloud", "collection"],
            },
            Lesson {
                id: 5,
                title: "Unit Review & Project",
                vocabulary: &["water story", "citizen", "imagination", "reflection"],
            },
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_numbered_in_order() {
        let ids: Vec<u32> = CURRICULUM.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn every_unit_has_five_lessons_with_vocabulary() {
        for unit in CURRICULUM {
            assert_eq!(unit.lessons.len(), 5, "unit {}", unit.id);
            assert!(unit.lessons.iter().all(|l| !l.vocabulary.is_empty()));
        }
    }

    #[test]
    fn lookups() {
        let unit = find_unit(1).unwrap();
        assert_eq!(unit.title, "Amazing places in Egypt");
        assert_eq!(unit.lesson(1).unwrap().title, "Cultural Sites");
        assert!(unit.lesson(9).is_none());
        assert!(find_unit(42).is_none());
    }
}
