//! Uniform buffer layouts of the two dialects.
//!
//! Both are derived from [`UniformSet::fields`]:
//!
//! - **Gen1**: one `f32` struct member per component; a vec3 control
//!   `name` becomes `name_r`, `name_g`, `name_b`.
//! - **Gen2**: `array<vec4<f32>, N>`. Each vec3 control takes a slot of
//!   its own (`.xyz`); scalars and gates are packed four to a slot in
//!   field order.

use std::collections::HashMap;

use super::{ShaderDialect, ShaderError};
use crate::uniforms::{UniformSet, UniformValue};

/// Shape of one uniform member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Gate,
    Scalar,
    Vec3,
}

impl From<&UniformValue> for UniformKind {
    fn from(value: &UniformValue) -> Self {
        match value {
            UniformValue::Gate(_) => Self::Gate,
            UniformValue::Scalar(_) => Self::Scalar,
            UniformValue::Vec3(_) => Self::Vec3,
        }
    }
}

/// Where one control lives in the packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub name: &'static str,
    pub kind: UniformKind,
    /// Offset of the first component, in `f32` units.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct UniformLayout {
    dialect: ShaderDialect,
    entries: Vec<LayoutEntry>,
    index: HashMap<&'static str, usize>,
    /// Buffer length in `f32` units, a multiple of four.
    len: usize,
}

const LANES: [&str; 4] = ["x", "y", "z", "w"];
const CHANNELS: [&str; 3] = ["r", "g", "b"];

impl UniformLayout {
    pub fn for_dialect(dialect: ShaderDialect) -> Self {
        let fields = UniformSet::default().fields();
        let mut entries = Vec::with_capacity(fields.len());
        let mut cursor = 0usize;

        match dialect {
            ShaderDialect::Gen1 => {
                for f in &fields {
                    entries.push(LayoutEntry {
                        name: f.name,
                        kind: UniformKind::from(&f.value),
                        offset: cursor,
                    });
                    cursor += f.value.components();
                }
            }
            ShaderDialect::Gen2 => {
                // Next free lane in the current scalar slot, if any.
                let mut scalar_lane: Option<usize> = None;
                for f in &fields {
                    let kind = UniformKind::from(&f.value);
                    let offset = match kind {
                        UniformKind::Vec3 => {
                            let slot_start = cursor;
                            cursor += 4;
                            slot_start
                        }
                        UniformKind::Gate | UniformKind::Scalar => match scalar_lane {
                            Some(at) if at % 4 != 0 => {
                                scalar_lane = Some(at + 1);
                                at
                            }
                            _ => {
                                let slot_start = cursor;
                                cursor += 4;
                                scalar_lane = Some(slot_start + 1);
                                slot_start
                            }
                        },
                    };
                    entries.push(LayoutEntry {
                        name: f.name,
                        kind,
                        offset,
                    });
                }
            }
        }

        let len = cursor.div_ceil(4) * 4;
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name, i))
            .collect();
        Self {
            dialect,
            entries,
            index,
            len,
        }
    }

    pub fn dialect(&self) -> ShaderDialect {
        self.dialect
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Result<&LayoutEntry, ShaderError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ShaderError::UnknownUniform(name.to_string()))
    }

    /// Buffer length in `f32` units.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Buffer size in bytes.
    pub fn byte_size(&self) -> u64 {
        (self.len * std::mem::size_of::<f32>()) as u64
    }

    /// Number of `vec4` slots (Gen2 array length).
    pub fn slot_count(&self) -> usize {
        self.len / 4
    }

    /// WGSL expression reading a control's value.
    pub fn value_expr(&self, name: &str) -> Result<String, ShaderError> {
        let entry = self.entry(name)?;
        Ok(match (self.dialect, entry.kind) {
            (ShaderDialect::Gen1, UniformKind::Vec3) => format!(
                "vec3<f32>(u.{n}_r, u.{n}_g, u.{n}_b)",
                n = entry.name
            ),
            (ShaderDialect::Gen1, _) => format!("u.{}", entry.name),
            (ShaderDialect::Gen2, UniformKind::Vec3) => {
                format!("u.slots[{}].xyz", entry.offset / 4)
            }
            (ShaderDialect::Gen2, _) => format!(
                "u.slots[{}].{}",
                entry.offset / 4,
                LANES[entry.offset % 4]
            ),
        })
    }

    /// WGSL boolean expression testing a gate.
    pub fn gate_expr(&self, name: &str) -> Result<String, ShaderError> {
        let entry = self.entry(name)?;
        if entry.kind != UniformKind::Gate {
            return Err(ShaderError::NotAGate(name.to_string()));
        }
        Ok(format!("({} > 0.5)", self.value_expr(name)?))
    }

    /// WGSL declaration of the `Params` struct.
    pub fn struct_declaration(&self) -> String {
        let mut out = String::from("struct Params {\n");
        match self.dialect {
            ShaderDialect::Gen1 => {
                for entry in &self.entries {
                    if entry.kind == UniformKind::Vec3 {
                        for ch in CHANNELS {
                            out.push_str(&format!("    {}_{ch}: f32,\n", entry.name));
                        }
                    } else {
                        out.push_str(&format!("    {}: f32,\n", entry.name));
                    }
                }
            }
            ShaderDialect::Gen2 => {
                out.push_str(&format!(
                    "    slots: array<vec4<f32>, {}>,\n",
                    self.slot_count()
                ));
            }
        }
        out.push_str("}\n");
        out
    }

    /// Pack a uniform set into the buffer contents.
    pub fn pack(&self, set: &UniformSet) -> Vec<f32> {
        let mut buf = vec![0.0f32; self.len];
        for (entry, field) in self.entries.iter().zip(set.fields()) {
            debug_assert_eq!(entry.name, field.name);
            match field.value {
                UniformValue::Gate(g) => buf[entry.offset] = g.as_f32(),
                UniformValue::Scalar(v) => buf[entry.offset] = v,
                UniformValue::Vec3(v) => buf[entry.offset..entry.offset + 3].copy_from_slice(&v),
            }
        }
        buf
    }

    /// Read a control back out of a packed buffer.
    pub fn unpack(&self, buf: &[f32], name: &str) -> Result<UniformValue, ShaderError> {
        let entry = self.entry(name)?;
        let at = entry.offset;
        Ok(match entry.kind {
            UniformKind::Gate => UniformValue::Gate((buf[at] > 0.5).into()),
            UniformKind::Scalar => UniformValue::Scalar(buf[at]),
            UniformKind::Vec3 => UniformValue::Vec3([buf[at], buf[at + 1], buf[at + 2]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GradingParameters;

    fn sample_set() -> UniformSet {
        let mut params = GradingParameters::default();
        params.tone.exposure = 25.0;
        params.white_balance.temperature = 30.0;
        params.hsl.aqua = [10.0, 20.0, 30.0];
        params.split_tone.balance = 15.0;
        UniformSet::from_params(&params)
    }

    #[test]
    fn test_gen1_one_member_per_component() {
        let layout = UniformLayout::for_dialect(ShaderDialect::Gen1);
        let components: usize = UniformSet::default()
            .fields()
            .iter()
            .map(|f| f.value.components())
            .sum();
        assert_eq!(layout.len(), components.div_ceil(4) * 4);
        let decl = layout.struct_declaration();
        assert!(decl.contains("    wb_gains_g: f32,\n"));
        assert!(decl.contains("    exposure_enabled: f32,\n"));
        assert!(!decl.contains("vec"));
    }

    #[test]
    fn test_gen2_vec3_own_slot_and_scalars_share() {
        let layout = UniformLayout::for_dialect(ShaderDialect::Gen2);
        for entry in layout.entries() {
            if entry.kind == UniformKind::Vec3 {
                assert_eq!(entry.offset % 4, 0, "{} not slot aligned", entry.name);
            }
        }
        let mut offsets: Vec<_> = layout
            .entries()
            .iter()
            .flat_map(|e| {
                let n = if e.kind == UniformKind::Vec3 { 3 } else { 1 };
                (e.offset..e.offset + n).collect::<Vec<_>>()
            })
            .collect();
        let total = offsets.len();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), total, "overlapping uniforms");
        // The scalars after film_gamma fill the gate's slot before a new one opens.
        let gate = layout.entry("film_curve_enabled").expect("exists").offset;
        let toe = layout.entry("film_toe").expect("exists").offset;
        let shoulder = layout.entry("film_shoulder").expect("exists").offset;
        assert_eq!((gate, toe), (0, 3));
        assert_eq!(shoulder % 4, 0);
    }

    #[test]
    fn test_pack_round_trips_every_field() {
        let set = sample_set();
        for dialect in [ShaderDialect::Gen1, ShaderDialect::Gen2] {
            let layout = UniformLayout::for_dialect(dialect);
            let buf = layout.pack(&set);
            assert_eq!(buf.len(), layout.len());
            for field in set.fields() {
                let value = layout.unpack(&buf, field.name).expect("known field");
                assert_eq!(value, field.value, "{dialect:?} {}", field.name);
            }
        }
    }

    #[test]
    fn test_access_expressions() {
        let gen1 = UniformLayout::for_dialect(ShaderDialect::Gen1);
        assert_eq!(gen1.value_expr("exposure_gain").as_deref(), Ok("u.exposure_gain"));
        assert_eq!(
            gen1.value_expr("wb_gains").as_deref(),
            Ok("vec3<f32>(u.wb_gains_r, u.wb_gains_g, u.wb_gains_b)")
        );
        assert_eq!(
            gen1.gate_expr("hsl_enabled").as_deref(),
            Ok("(u.hsl_enabled > 0.5)")
        );

        let gen2 = UniformLayout::for_dialect(ShaderDialect::Gen2);
        assert!(gen2.value_expr("wb_gains").expect("exists").ends_with(".xyz"));
        assert!(gen2.gate_expr("film_curve_enabled").expect("exists").starts_with("(u.slots[0].x"));
    }
}
