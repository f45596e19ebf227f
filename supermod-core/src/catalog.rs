use std::collections::BTreeSet;

use crate::rules::{AcceptFilter, Rule};

/// Composite tags and the tags they stand for. Expansion repeats until no
/// alias is left.
pub const RULE_ALIASES: &[(&str, &[&str])] = &[
    ("sounds", &["sounds/ogg", "sounds/wav", "sounds/mp3"]),
    ("models", &["models/block", "models/item"]),
    ("3d", &["3d/stl", "3d/obj"]),
    ("lang", &["lang/en_us"]),
    ("any", &["textures", "sounds", "models", "3d", "lang", "recipes"]),
];

fn alias(tag: &str) -> Option<&'static [&'static str]> {
    RULE_ALIASES
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, expansion)| *expansion)
}

/// Turns a comma-separated, case-insensitive tag expression into the set of
/// concrete category tags it names.
pub fn expand_tags(expr: &str) -> BTreeSet<String> {
    let mut pending: Vec<String> = expr
        .to_lowercase()
        .split(',')
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    let mut expanded: BTreeSet<String> = BTreeSet::new();
    let mut tags = BTreeSet::new();

    while let Some(tag) = pending.pop() {
        match alias(&tag) {
            Some(members) => {
                if expanded.insert(tag) {
                    pending.extend(members.iter().map(|m| m.to_string()));
                }
            }
            None => {
                tags.insert(tag);
            }
        }
    }
    tags
}

/// Category table: each tag owns the rules used for it, in the order rules
/// are tried against archive entries.
pub struct Catalog {
    categories: Vec<(&'static str, Vec<Rule>)>,
}

impl Catalog {
    pub fn standard() -> Catalog {
        let categories = vec![
            ("textures", vec![Rule::identity("textures", "**/*.png", "textures")]),
            ("sounds/ogg", vec![Rule::identity("sounds/ogg", "**/*.ogg", "sounds/ogg")]),
            ("sounds/wav", vec![Rule::identity("sounds/wav", "**/*.wav", "sounds/wav")]),
            ("sounds/mp3", vec![Rule::identity("sounds/mp3", "**/*.mp3", "sounds/mp3")]),
            ("3d/stl", vec![Rule::identity("3d/stl", "**/*.stl", "3d/stl")]),
            ("3d/obj", vec![Rule::identity("3d/obj", "**/*.obj", "3d/obj")]),
            (
                "models/block",
                vec![Rule::json(
                    "models/block",
                    "assets/*/models/block/*.json",
                    "assets/models/block",
                    &[
                        &["elements", "*", "from"],
                        &["elements", "*", "to"],
                        &["elements", "*", "rotation"],
                    ],
                    AcceptFilter::Any,
                )],
            ),
            (
                "models/item",
                vec![Rule::json(
                    "models/item",
                    "assets/*/models/item/*.json",
                    "assets/models/item",
                    &[&["display", "*", "rotation"], &["display", "*", "translation"]],
                    AcceptFilter::Any,
                )],
            ),
            (
                "lang/en_us",
                vec![Rule::json(
                    "lang/en_us",
                    "assets/*/lang/en_us.json",
                    "assets/lang/en_us",
                    &[&["*"]],
                    AcceptFilter::Any,
                )],
            ),
            (
                "recipes",
                vec![Rule::json(
                    "recipes",
                    "data/*/recipes/**/*.json",
                    "data/recipes",
                    &[&["result", "item"], &["ingredient", "item"], &["key", "*", "item"]],
                    AcceptFilter::MinecraftOnly,
                )],
            ),
        ];
        Catalog { categories }
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.iter().map(|(tag, _)| *tag)
    }

    /// Rules of every category named by `expr`, in table order.
    pub fn select(&self, expr: &str) -> Vec<&Rule> {
        let wanted = expand_tags(expr);
        for tag in &wanted {
            if !self.categories.iter().any(|(known, _)| known == tag) {
                log::warn!("unknown rule tag '{tag}' ignored");
            }
        }

        self.categories
            .iter()
            .filter(|(tag, _)| wanted.contains(*tag))
            .flat_map(|(_, rules)| rules.iter())
            .collect()
    }
}

/// Owned rules from the standard catalog for a tag expression.
pub fn filter_rules(expr: &str) -> Vec<Rule> {
    Catalog::standard().select(expr).into_iter().cloned().collect()
}
