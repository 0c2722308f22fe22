use std::fmt;
use std::str::FromStr;

/// Legal subject areas a question can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LegalDomain {
    #[default]
    General,
    Civil,
    Criminal,
    Commercial,
    Administrative,
    IntellectualProperty,
}

impl LegalDomain {
    /// Display order used by the domain picker.
    pub const ALL: [LegalDomain; 6] = [
        LegalDomain::General,
        LegalDomain::Civil,
        LegalDomain::Commercial,
        LegalDomain::Criminal,
        LegalDomain::Administrative,
        LegalDomain::IntellectualProperty,
    ];

    /// Tag sent to the model inside the prompt prefix.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::General => "综合咨询",
            Self::Civil => "民事/婚姻/继承",
            Self::Criminal => "刑事辩护",
            Self::Commercial => "公司/合同/破产",
            Self::Administrative => "行政/国家赔偿",
            Self::IntellectualProperty => "知识产权",
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Civil => "civil",
            Self::Criminal => "criminal",
            Self::Commercial => "commercial",
            Self::Administrative => "admin",
            Self::IntellectualProperty => "ip",
        }
    }

    pub const fn icon(self) -> &'static str {
        match self {
            Self::General => "⚖️",
            Self::Civil => "🏠",
            Self::Criminal => "🚔",
            Self::Commercial => "🏢",
            Self::Administrative => "🏛️",
            Self::IntellectualProperty => "💡",
        }
    }

    pub const fn is_general(self) -> bool {
        matches!(self, Self::General)
    }

    /// Builds the prompt actually sent upstream for `raw_input`.
    pub fn compose_prompt(self, raw_input: &str) -> String {
        if self.is_general() {
            raw_input.to_string()
        } else {
            format!("[领域: {}] {}", self.tag(), raw_input)
        }
    }
}

impl fmt::Display for LegalDomain {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDomain(pub String);

impl fmt::Display for UnknownDomain {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "unknown legal domain '{}'", self.0)
    }
}

impl std::error::Error for UnknownDomain {}

/// Accepts either the ASCII slug or the Chinese tag.
impl FromStr for LegalDomain {
    type Err = UnknownDomain;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|domain| domain.slug().eq_ignore_ascii_case(raw) || domain.tag() == raw)
            .ok_or_else(|| UnknownDomain(raw.to_string()))
    }
}
