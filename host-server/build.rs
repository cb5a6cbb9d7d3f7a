use vergen::EmitBuilder;

fn main() -> anyhow::Result<()> {
    EmitBuilder::builder()
        .build_timestamp()
        .git_sha(false)
        .emit()?;

    Ok(())
}
