//! Text LUT decoding (`.cube` and mesh-list) and `.cube` writing.
//!
//! # Formats
//!
//! ```text
//! # cube: float triples, R fastest
//! TITLE "Print Film"
//! LUT_3D_SIZE 33
//! DOMAIN_MIN 0.0 0.0 0.0
//! DOMAIN_MAX 1.0 1.0 1.0
//! 0.0 0.0 0.0
//! ...
//! ```
//!
//! ```text
//! # mesh-list: output scale, then integer triples, B fastest
//! 4095
//! 0 0 0
//! 0 0 273
//! ...
//! ```
//!
//! Malformed input is always an error carrying the 1-based line number.
//! A broken LUT never degrades to identity.

use std::fmt::Write as _;
use std::path::Path;

use crate::lut::{Lut3D, LutError, check_size};

/// LUT text formats understood by [`read_lut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LutFormat {
    Cube,
    MeshList,
}

impl LutFormat {
    /// Guess from a file extension; anything but `.cube` is a mesh-list.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("cube") => Self::Cube,
            _ => Self::MeshList,
        }
    }
}

/// Read a LUT file, picking the format from its extension.
pub fn read_lut(path: &Path) -> Result<Lut3D, LutError> {
    let text = std::fs::read_to_string(path)?;
    let lut = match LutFormat::from_path(path) {
        LutFormat::Cube => parse_cube(&text)?,
        LutFormat::MeshList => parse_mesh_list(&text)?,
    };
    tracing::debug!(path = %path.display(), size = lut.size, "loaded 3D LUT");
    Ok(lut)
}

/// Parse `.cube` text.
pub fn parse_cube(text: &str) -> Result<Lut3D, LutError> {
    let mut size: Option<u32> = None;
    let mut data: Vec<[f32; 3]> = Vec::new();
    let mut last_line = 0;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        last_line = line_no;

        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default();
        match keyword {
            "TITLE" => continue,
            "LUT_1D_SIZE" => {
                return Err(parse_err(line_no, "1D LUTs are not supported"));
            }
            "LUT_3D_SIZE" => {
                if !data.is_empty() {
                    return Err(parse_err(line_no, "LUT_3D_SIZE after data lines"));
                }
                let value = single_token(tokens, line_no)?;
                let n = value
                    .parse::<u32>()
                    .map_err(|_| parse_err(line_no, format!("invalid size '{value}'")))?;
                check_size(n).map_err(|e| parse_err(line_no, e.to_string()))?;
                size = Some(n);
            }
            "DOMAIN_MIN" | "DOMAIN_MAX" => {
                let expected = if keyword == "DOMAIN_MIN" { 0.0 } else { 1.0 };
                let domain = parse_floats(line, line_no)?;
                if domain.iter().any(|v| *v != expected) {
                    return Err(parse_err(
                        line_no,
                        format!("{keyword} must be {expected} on every channel"),
                    ));
                }
            }
            _ => data.push(parse_floats(line, line_no)?),
        }
    }

    let size = match size {
        Some(n) => n,
        None => infer_size(data.len(), last_line)?,
    };
    check_count(size, data.len(), last_line)?;
    Lut3D::from_data(size, data)
}

/// Parse mesh-list text: an integer output scale followed by `N³` integer
/// triples with blue varying fastest.
pub fn parse_mesh_list(text: &str) -> Result<Lut3D, LutError> {
    let mut scale: Option<u32> = None;
    let mut triples: Vec<[u32; 3]> = Vec::new();
    let mut last_line = 0;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        last_line = line_no;

        if scale.is_none() {
            let value = single_token(line.split_whitespace(), line_no)?;
            let max = value
                .parse::<u32>()
                .map_err(|_| parse_err(line_no, format!("invalid scale '{value}'")))?;
            if max == 0 {
                return Err(parse_err(line_no, "scale must be positive"));
            }
            scale = Some(max);
            continue;
        }

        let mut triple = [0u32; 3];
        let mut count = 0;
        for token in line.split_whitespace() {
            if count == 3 {
                return Err(parse_err(line_no, "expected 3 values"));
            }
            triple[count] = token
                .parse()
                .map_err(|_| parse_err(line_no, format!("invalid integer '{token}'")))?;
            count += 1;
        }
        if count != 3 {
            return Err(parse_err(line_no, "expected 3 values"));
        }
        triples.push(triple);
    }

    let scale = scale.ok_or_else(|| parse_err(last_line.max(1), "missing scale header"))? as f32;
    let size = infer_size(triples.len(), last_line)?;
    let n = size as usize;

    // File order is B fastest; grid order is R fastest.
    let mut data = vec![[0.0f32; 3]; n * n * n];
    for (file_idx, t) in triples.iter().enumerate() {
        let b = file_idx % n;
        let g = (file_idx / n) % n;
        let r = file_idx / (n * n);
        data[r + g * n + b * n * n] = t.map(|v| v as f32 / scale);
    }
    Lut3D::from_data(size, data)
}

impl Lut3D {
    /// Render as `.cube` text with an optional title.
    pub fn to_cube_string(&self, title: Option<&str>) -> String {
        let mut out = String::with_capacity(self.data.len() * 28 + 64);
        if let Some(title) = title {
            let _ = writeln!(out, "TITLE \"{title}\"");
        }
        let _ = writeln!(out, "LUT_3D_SIZE {}", self.size);
        let _ = writeln!(out, "DOMAIN_MIN 0.0 0.0 0.0");
        let _ = writeln!(out, "DOMAIN_MAX 1.0 1.0 1.0");
        for [r, g, b] in &self.data {
            let _ = writeln!(out, "{r:.6} {g:.6} {b:.6}");
        }
        out
    }

    /// Write `.cube` text to `path`.
    pub fn write_cube(&self, path: &Path, title: Option<&str>) -> Result<(), LutError> {
        std::fs::write(path, self.to_cube_string(title))?;
        Ok(())
    }
}

fn parse_err(line: usize, message: impl Into<String>) -> LutError {
    LutError::Parse {
        line,
        message: message.into(),
    }
}

fn single_token<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    line_no: usize,
) -> Result<&'a str, LutError> {
    let value = tokens
        .next()
        .ok_or_else(|| parse_err(line_no, "missing value"))?;
    if tokens.next().is_some() {
        return Err(parse_err(line_no, "unexpected extra value"));
    }
    Ok(value)
}

fn parse_floats(line: &str, line_no: usize) -> Result<[f32; 3], LutError> {
    let mut out = [0.0f32; 3];
    let mut count = 0;
    for token in line.split_whitespace() {
        // Keyword lines pass their keyword through here too.
        if count == 0 && token.starts_with("DOMAIN_") {
            continue;
        }
        if count == 3 {
            return Err(parse_err(line_no, "expected 3 values"));
        }
        out[count] = token
            .parse()
            .map_err(|_| parse_err(line_no, format!("invalid number '{token}'")))?;
        count += 1;
    }
    if count != 3 {
        return Err(parse_err(line_no, "expected 3 values"));
    }
    Ok(out)
}

fn infer_size(entries: usize, last_line: usize) -> Result<u32, LutError> {
    let n = (entries as f64).cbrt().round() as usize;
    if n * n * n != entries || n < 2 {
        return Err(parse_err(
            last_line.max(1),
            format!("{entries} entries is not a cubic grid"),
        ));
    }
    Ok(n as u32)
}

fn check_count(size: u32, found: usize, last_line: usize) -> Result<(), LutError> {
    let expected = (size as usize).pow(3);
    if found != expected {
        let what = if found < expected { "truncated" } else { "extra" };
        return Err(parse_err(
            last_line.max(1),
            format!("{what} data: expected {expected} entries, found {found}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_2() -> String {
        let mut text = String::from("# test\nTITLE \"t\"\nLUT_3D_SIZE 2\n");
        for b in 0..2 {
            for g in 0..2 {
                for r in 0..2 {
                    text.push_str(&format!("{} {} {}\n", r as f32 * 0.5, g, b));
                }
            }
        }
        text
    }

    #[test]
    fn test_parse_cube_r_fastest() {
        let lut = parse_cube(&cube_2()).expect("valid cube");
        assert_eq!(lut.size, 2);
        assert_eq!(lut.at(1, 0, 0), [0.5, 0.0, 0.0]);
        assert_eq!(lut.at(0, 1, 1), [0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_cube_truncated_reports_line() {
        let text: String = cube_2().lines().take(9).map(|l| format!("{l}\n")).collect();
        let err = parse_cube(&text).expect_err("truncated");
        match err {
            LutError::Parse { line, message } => {
                assert_eq!(line, 9);
                assert!(message.contains("truncated"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cube_bad_token_reports_line() {
        let text = cube_2().replace("0.5 1 1", "0.5 x 1");
        let err = parse_cube(&text).expect_err("bad token");
        assert!(matches!(err, LutError::Parse { line: 11, .. }), "{err}");
    }

    #[test]
    fn test_cube_rejects_1d_and_foreign_domain() {
        assert!(parse_cube("LUT_1D_SIZE 4\n").is_err());
        let text = cube_2().replace("LUT_3D_SIZE 2", "LUT_3D_SIZE 2\nDOMAIN_MAX 2 2 2");
        assert!(matches!(parse_cube(&text), Err(LutError::Parse { line: 4, .. })));
    }

    #[test]
    fn test_cube_huge_size_is_an_error() {
        for text in [
            "LUT_3D_SIZE 3000000\n0 0 0\n",
            "LUT_3D_SIZE 4294967295\n",
            "LUT_3D_SIZE 0\n",
        ] {
            let err = parse_cube(text).expect_err("size out of range");
            match err {
                LutError::Parse { line, message } => {
                    assert_eq!(line, 1);
                    assert!(message.contains("invalid LUT size"), "{message}");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_cube_without_size_infers_it() {
        let text = cube_2().replace("LUT_3D_SIZE 2\n", "");
        assert_eq!(parse_cube(&text).expect("inferred").size, 2);
    }

    #[test]
    fn test_cube_writer_output_parses_back() {
        let lut = Lut3D::identity(3).expect("valid size");
        let parsed = parse_cube(&lut.to_cube_string(Some("id"))).expect("writer output parses");
        assert_eq!(parsed.size, 3);
        for (a, b) in lut.data.iter().zip(&parsed.data) {
            for c in 0..3 {
                assert!((a[c] - b[c]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_mesh_list_blue_fastest() {
        let mut text = String::from("# mesh\n1023\n");
        for r in 0..2 {
            for g in 0..2 {
                for b in 0..2 {
                    text.push_str(&format!("{} {} {}\n", r * 1023, g * 1023, b * 1023));
                }
            }
        }
        let lut = parse_mesh_list(&text).expect("valid mesh list");
        assert_eq!(lut.size, 2);
        assert_eq!(lut.at(1, 0, 1), [1.0, 0.0, 1.0]);
        assert_eq!(lut.at(0, 1, 0), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_mesh_list_errors() {
        assert!(matches!(
            parse_mesh_list("255\n0 0\n"),
            Err(LutError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_mesh_list("0\n"),
            Err(LutError::Parse { line: 1, .. })
        ));
        // 7 triples is not a cube.
        let text = format!("255\n{}", "1 2 3\n".repeat(7));
        assert!(matches!(parse_mesh_list(&text), Err(LutError::Parse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(LutFormat::from_path(Path::new("a/Film.CUBE")), LutFormat::Cube);
        assert_eq!(LutFormat::from_path(Path::new("a/film.3dl")), LutFormat::MeshList);
    }
}
