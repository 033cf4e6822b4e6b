use std::path::PathBuf;

use eframe::egui;

use region_edit::app::EditorApp;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let book_path = args.get(1).map(PathBuf::from);
    if let Some(path) = &book_path {
        if !path.exists() {
            eprintln!("File not found: {}", path.display());
            std::process::exit(1);
        }
    }
    // Asset root holding books/ and audio/; defaults to the record's folder.
    let asset_root = args
        .get(2)
        .map(PathBuf::from)
        .or_else(|| {
            book_path
                .as_ref()
                .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        })
        .unwrap_or_else(|| PathBuf::from("."));

    let title = match &book_path {
        Some(p) => format!(
            "region-edit — {}",
            p.file_name().unwrap_or_default().to_str().unwrap_or("")
        ),
        None => "region-edit".to_string(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(EditorApp::new(asset_root, book_path)))),
    )
    .expect("Failed to run eframe");
}
