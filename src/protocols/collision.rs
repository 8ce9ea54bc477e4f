//! Collision: forces the passage against five randomly drawn contemporary
//! vectors, one per category.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{OutputConstraints, Protocol};

pub const SYSTEM_PROMPT: &str = include_str!("../../prompts/collision.md");

pub const PROTOCOL: Protocol = Protocol::new("collision", SYSTEM_PROMPT, 6000, output_constraints);

/// Movement of a collision study, in order.
pub const STEPS: [&str; 6] = [
    "anchor_in_antiquity",
    "collide_with_now",
    "navigate_rupture",
    "crystallize_insight",
    "release_into_future",
    "generative_outputs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorCategory {
    Scientific,
    Cultural,
    Philosophical,
    Technological,
    Personal,
}

impl VectorCategory {
    pub const ALL: [VectorCategory; 5] = [
        Self::Scientific,
        Self::Cultural,
        Self::Philosophical,
        Self::Technological,
        Self::Personal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scientific => "scientific",
            Self::Cultural => "cultural",
            Self::Philosophical => "philosophical",
            Self::Technological => "technological",
            Self::Personal => "personal",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Scientific => "Scientific",
            Self::Cultural => "Cultural",
            Self::Philosophical => "Philosophical",
            Self::Technological => "Technological",
            Self::Personal => "Personal",
        }
    }

    /// The fixed option list for this category.
    pub fn options(&self) -> &'static [&'static str] {
        match self {
            Self::Scientific => &SCIENTIFIC,
            Self::Cultural => &CULTURAL,
            Self::Philosophical => &PHILOSOPHICAL,
            Self::Technological => &TECHNOLOGICAL,
            Self::Personal => &PERSONAL,
        }
    }

    /// Case-insensitive membership in this category's option list.
    pub fn contains(&self, candidate: &str) -> bool {
        let needle = candidate.trim().to_lowercase();
        self.options().iter().any(|o| o.to_lowercase() == needle)
    }
}

impl FromStr for VectorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown collision category: {}. Must be one of: scientific, cultural, philosophical, technological, personal",
                    s
                )
            })
    }
}

impl fmt::Display for VectorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SCIENTIFIC: [&str; 10] = [
    "Quantum entanglement and non-locality",
    "CRISPR gene editing and human enhancement",
    "Artificial intelligence emergence and consciousness",
    "Climate tipping points and planetary boundaries",
    "Neuroscience of trauma and memory",
    "Dark matter and the invisible universe",
    "Mycorrhizal networks and underground communication",
    "Epigenetics and inherited trauma",
    "Particle physics and the observer effect",
    "Microbiome research and symbiotic identity",
];

const CULTURAL: [&str; 10] = [
    "Late-stage capitalism and spiritual exhaustion",
    "Social media algorithms and identity formation",
    "Surveillance capitalism and privacy collapse",
    "Cancel culture and public shame",
    "Streaming platforms and narrative fragmentation",
    "Gig economy precarity and meaning",
    "True crime obsession and collective trauma",
    "Influencer culture and parasocial relationships",
    "Climate anxiety and apocalyptic imagination",
    "Wellness industry and commercialized spirituality",
];

const PHILOSOPHICAL: [&str; 10] = [
    "Derrida's différance and meaning's perpetual deferral",
    "Levinas's ethics of the face and infinite responsibility",
    "Foucault's biopower and disciplinary societies",
    "Heidegger's being-toward-death and authentic existence",
    "Zizek's parallax view and ideological fantasy",
    "Butler's performativity and constructed identity",
    "Agamben's homo sacer and bare life",
    "Nancy's being singular plural and community",
    "Badiou's event and truth procedures",
    "Haraway's cyborg manifesto and boundary transgression",
];

const TECHNOLOGICAL: [&str; 10] = [
    "Deepfakes and the collapse of visual truth",
    "VR/AR and the virtualization of experience",
    "Cryptocurrency and decentralized trust",
    "Brain-computer interfaces and cognitive enhancement",
    "Automated decision systems and algorithmic justice",
    "Digital resurrection and grief tech",
    "Biometric surveillance and bodily data",
    "Gene therapy and designer biology",
    "Quantum computing and computational limits",
    "Neural networks and machine learning opacity",
];

const PERSONAL: [&str; 10] = [
    "Chronic illness and the loss of future",
    "Career transition and identity dissolution",
    "Infertility and unfulfilled longing",
    "Addiction recovery and radical dependence",
    "Divorce and the death of shared narrative",
    "Aging parents and role reversal",
    "Empty nest and purposelessness",
    "Religious deconstruction and spiritual homelessness",
    "Burnout and the exhaustion of meaning",
    "Grief that refuses resolution",
];

/// One chosen vector per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionVectors {
    pub scientific: String,
    pub cultural: String,
    pub philosophical: String,
    pub technological: String,
    pub personal: String,
}

impl CollisionVectors {
    pub fn get(&self, category: VectorCategory) -> &str {
        match category {
            VectorCategory::Scientific => &self.scientific,
            VectorCategory::Cultural => &self.cultural,
            VectorCategory::Philosophical => &self.philosophical,
            VectorCategory::Technological => &self.technological,
            VectorCategory::Personal => &self.personal,
        }
    }

    pub fn set(&mut self, category: VectorCategory, value: impl Into<String>) {
        let slot = match category {
            VectorCategory::Scientific => &mut self.scientific,
            VectorCategory::Cultural => &mut self.cultural,
            VectorCategory::Philosophical => &mut self.philosophical,
            VectorCategory::Technological => &mut self.technological,
            VectorCategory::Personal => &mut self.personal,
        };
        *slot = value.into();
    }

    /// Build by asking `pick` for each category in order.
    pub fn from_fn<F>(mut pick: F) -> Self
    where
        F: FnMut(VectorCategory) -> String,
    {
        Self {
            scientific: pick(VectorCategory::Scientific),
            cultural: pick(VectorCategory::Cultural),
            philosophical: pick(VectorCategory::Philosophical),
            technological: pick(VectorCategory::Technological),
            personal: pick(VectorCategory::Personal),
        }
    }
}

pub fn wrap_input(text: &str, reference: &str, vectors: &CollisionVectors) -> String {
    let mut out = format!("Biblical Reference: {reference}\n\nText:\n{text}\n\nCollision Vectors:\n");
    for category in VectorCategory::ALL {
        out.push_str(&format!("- {}: {}\n", category.title(), vectors.get(category)));
    }
    out.push_str("\nGenerate a complete Collision Engine study following the protocol above.\n");
    out
}

pub fn output_constraints() -> OutputConstraints {
    OutputConstraints::markdown(3000, 5000, "prophetic-stark-crescendo", &STEPS)
}
