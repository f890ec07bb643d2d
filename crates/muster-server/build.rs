fn main() -> anyhow::Result<()> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")?;
    version_gen::gen_muster_version(manifest_dir, env!("CARGO_PKG_VERSION"))
}
