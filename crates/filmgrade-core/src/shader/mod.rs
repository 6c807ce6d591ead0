//! WGSL generation for the two shader dialects.
//!
//! A program is assembled as:
//!
//! 1. the `Params` struct for the dialect's [`UniformLayout`]
//! 2. the dialect prelude (bindings, LUT and curve sampling)
//! 3. the common color helpers
//! 4. one function per [`Stage`], each preceded by its `// @stage` marker
//! 5. `vs_main` / `fs_main`
//!
//! Steps 2 to 5 are templates; every `{{u:..}}` and `{{gate:..}}` is
//! resolved against the layout before the source is handed out.

pub mod fragments;
pub mod gen1;
pub mod gen2;
pub mod layout;
pub mod template;

use thiserror::Error;

pub use layout::{LayoutEntry, UniformKind, UniformLayout};
pub use template::Template;

use crate::stages::Stage;
use crate::uniforms::UniformSet;

/// Target shader generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// Flat scalar uniforms, 2-D packed LUT, one texture per curve.
    Gen1,
    /// `vec4` uniform slots, native 3-D LUT, one RGBA curve texture.
    Gen2,
}

impl ShaderDialect {
    pub const ALL: [ShaderDialect; 2] = [ShaderDialect::Gen1, ShaderDialect::Gen2];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gen1 => "gen1",
            Self::Gen2 => "gen2",
        }
    }
}

impl std::fmt::Display for ShaderDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("unknown uniform '{0}'")]
    UnknownUniform(String),
    #[error("uniform '{0}' is not a gate")]
    NotAGate(String),
    #[error("malformed placeholder at byte {0}")]
    MalformedPlaceholder(usize),
}

/// A generated WGSL program and the uniform layout it expects.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    dialect: ShaderDialect,
    source: String,
    layout: UniformLayout,
}

impl ShaderProgram {
    pub fn generate(dialect: ShaderDialect) -> Result<Self, ShaderError> {
        let layout = UniformLayout::for_dialect(dialect);

        let mut text = match dialect {
            ShaderDialect::Gen1 => gen1::prelude(),
            ShaderDialect::Gen2 => gen2::prelude(),
        };
        text.push('\n');
        text.push_str(&fragments::common_prelude());
        for stage in Stage::ALL {
            text.push('\n');
            text.push_str(&fragments::stage_fragment(stage));
        }
        text.push('\n');
        text.push_str(&fragments::entry_points());

        let body = Template::parse(&text)?.resolve(&layout)?;
        let mut source = layout.struct_declaration();
        source.push('\n');
        source.push_str(&body);

        tracing::debug!(
            dialect = %dialect,
            bytes = source.len(),
            uniforms = layout.len(),
            "generated shader"
        );
        Ok(Self {
            dialect,
            source,
            layout,
        })
    }

    pub fn dialect(&self) -> ShaderDialect {
        self.dialect
    }

    /// WGSL source.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    /// Uniform buffer contents for `uniforms`.
    pub fn pack_uniforms(&self, uniforms: &UniformSet) -> Vec<f32> {
        self.layout.pack(uniforms)
    }

    /// Stage markers in source order, as `(number, name)`.
    pub fn stage_markers(&self) -> Vec<(usize, String)> {
        self.source
            .lines()
            .filter_map(|line| line.trim().strip_prefix("// @stage "))
            .filter_map(|rest| {
                let (num, name) = rest.split_once(' ')?;
                Some((num.parse().ok()?, name.trim().to_string()))
            })
            .collect()
    }
}
