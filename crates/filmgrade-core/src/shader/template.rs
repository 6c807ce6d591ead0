//! Minimal WGSL template model.
//!
//! Fragments are plain WGSL with two placeholder forms:
//!
//! ```text
//! {{u:exposure_gain}}      value of a uniform (f32 or vec3<f32>)
//! {{gate:exposure_enabled}} boolean test of a gate uniform
//! ```
//!
//! A [`UniformLayout`] resolves each placeholder to the dialect's access
//! expression. Unknown names are an error, never an empty string.

use super::ShaderError;
use super::layout::UniformLayout;

/// One parsed piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Uniform(String),
    Gate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self, ShaderError> {
        let mut pieces = Vec::new();
        let mut rest = src;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                pieces.push(Piece::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(ShaderError::MalformedPlaceholder(offset + start))?;
            let inner = after[..end].trim();
            let piece = match inner.split_once(':') {
                Some(("u", name)) if is_identifier(name) => Piece::Uniform(name.to_string()),
                Some(("gate", name)) if is_identifier(name) => Piece::Gate(name.to_string()),
                _ => return Err(ShaderError::MalformedPlaceholder(offset + start)),
            };
            pieces.push(piece);

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            pieces.push(Piece::Text(rest.to_string()));
        }
        Ok(Self { pieces })
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Uniform names referenced by this template, in order of appearance.
    pub fn referenced(&self) -> impl Iterator<Item = &str> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Uniform(name) | Piece::Gate(name) => Some(name.as_str()),
            Piece::Text(_) => None,
        })
    }

    /// Substitute every placeholder with the layout's access expression.
    pub fn resolve(&self, layout: &UniformLayout) -> Result<String, ShaderError> {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Uniform(name) => out.push_str(&layout.value_expr(name)?),
                Piece::Gate(name) => out.push_str(&layout.gate_expr(name)?),
            }
        }
        Ok(out)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Placeholder for a uniform value, for building fragments in code.
pub fn uniform_ref(name: &str) -> String {
    format!("{{{{u:{name}}}}}")
}

/// Placeholder for a gate test.
pub fn gate_ref(name: &str) -> String {
    format!("{{{{gate:{name}}}}}")
}
