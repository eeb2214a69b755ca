use std::fmt;

use bevy::math::DVec3;

use crate::types::ReconstructedBrush;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// One entity: an ordered key/value list plus the brushes attached to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    attributes: Vec<(String, String)>,
    pub brushes: Vec<ReconstructedBrush>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classname(classname: &str) -> Self {
        let mut entity = Self::new();
        entity.set_attribute("classname", classname);
        entity
    }

    /// Value of the first attribute whose key matches case-insensitively.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite the first matching attribute, or append a new one.
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    /// Append an attribute without checking for an existing key.
    pub fn push_attribute(&mut self, key: &str, value: &str) {
        self.attributes.push((key.to_string(), value.to_string()));
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.attributes.remove(index).1)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn classname(&self) -> &str {
        self.attribute("classname").unwrap_or_default()
    }

    pub fn origin(&self) -> DVec3 {
        self.attribute("origin").map(parse_vector).unwrap_or(DVec3::ZERO)
    }

    pub fn angles(&self) -> DVec3 {
        self.attribute("angles").map(parse_vector).unwrap_or(DVec3::ZERO)
    }

    /// 0 for worldspawn, `N` for `"model" "*N"`, -1 for point entities.
    pub fn model_number(&self) -> i32 {
        if self.classname().eq_ignore_ascii_case("worldspawn") {
            return 0;
        }
        self.attribute("model")
            .and_then(|model| model.strip_prefix('*'))
            .and_then(|number| number.trim().parse().ok())
            .unwrap_or(-1)
    }

    pub fn is_brush_based(&self) -> bool {
        self.model_number() >= 0
    }
}

/// Parse up to three whitespace-separated floats. Missing or malformed trailing components are
/// left at 0.
pub fn parse_vector(value: &str) -> DVec3 {
    let mut out = [0.0; 3];
    for (slot, token) in out.iter_mut().zip(value.split_whitespace()) {
        match token.parse::<f64>() {
            Ok(v) => *slot = v,
            Err(_) => break,
        }
    }
    DVec3::from_array(out)
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Ordered entity collection, as stored in an entity lump.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entities {
    entities: Vec<Entity>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum EntityParseError {
    #[error("line {line}: '{{' inside an entity")]
    NestedEntity { line: usize },
    #[error("line {line}: '}}' without a matching '{{'")]
    UnmatchedClose { line: usize },
    #[error("line {line}: attribute outside an entity")]
    AttributeOutsideEntity { line: usize },
    #[error("line {line}: malformed attribute: {text}")]
    MalformedAttribute { line: usize, text: String },
    #[error("entity starting on line {line} is never closed")]
    UnterminatedEntity { line: usize },
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse entity-lump text: `{`/`}` delimited blocks of `"key" "value"` lines.
    pub fn parse(text: &str) -> Result<Self, EntityParseError> {
        let mut entities = Vec::new();
        let mut current: Option<(usize, Entity)> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim().trim_matches('\0').trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            match line {
                "{" => {
                    if current.is_some() {
                        return Err(EntityParseError::NestedEntity { line: line_no });
                    }
                    current = Some((line_no, Entity::new()));
                }
                "}" => match current.take() {
                    Some((_, entity)) => entities.push(entity),
                    None => return Err(EntityParseError::UnmatchedClose { line: line_no }),
                },
                _ => {
                    let Some((_, entity)) = current.as_mut() else {
                        return Err(EntityParseError::AttributeOutsideEntity { line: line_no });
                    };
                    let (key, value) = parse_attribute(line).ok_or_else(|| {
                        EntityParseError::MalformedAttribute {
                            line: line_no,
                            text: line.to_string(),
                        }
                    })?;
                    entity.push_attribute(key, value);
                }
            }
        }

        if let Some((line, _)) = current {
            return Err(EntityParseError::UnterminatedEntity { line });
        }
        Ok(Self { entities })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.entities.get_mut(index)
    }

    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Entity> {
        self.entities.iter_mut()
    }

    /// Total number of brushes attached to all entities.
    pub fn brush_count(&self) -> usize {
        self.entities.iter().map(|e| e.brushes.len()).sum()
    }
}

impl FromIterator<Entity> for Entities {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Entities {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

/// Writes the attribute text only (the entity-lump form). Brushes are left to an `OutputSink`.
impl fmt::Display for Entities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entity in &self.entities {
            writeln!(f, "{{")?;
            for (key, value) in entity.attributes() {
                writeln!(f, "\"{key}\" \"{value}\"")?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

fn parse_attribute(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split('"');
    let (Some(""), Some(key), Some(gap), Some(value)) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if !gap.trim().is_empty() {
        return None;
    }
    match parts.next() {
        Some(rest) if rest.trim().is_empty() && parts.next().is_none() => Some((key, value)),
        _ => None,
    }
}
