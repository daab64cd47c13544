fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    let includes = [std::path::PathBuf::from("./kanban"), protoc_bin_vendored::include_path()?];
    tonic_build::configure().compile_protos(&["./kanban/kanban.proto"], &includes)?;
    Ok(())
}
