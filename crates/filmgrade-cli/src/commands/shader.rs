use anyhow::{Context, Result};
use filmgrade_core::{ShaderDialect, ShaderProgram};

use crate::{DialectArg, ShaderArgs};

pub fn run(args: ShaderArgs) -> Result<()> {
    let dialect = match args.dialect {
        DialectArg::Gen1 => ShaderDialect::Gen1,
        DialectArg::Gen2 => ShaderDialect::Gen2,
    };
    let program = ShaderProgram::generate(dialect)
        .with_context(|| format!("generating {dialect} shader"))?;
    print!("{}", program.source());
    Ok(())
}
