use vantage::ViewerConfig;

fn main() -> anyhow::Result<()> {
    let mut config = ViewerConfig::default();
    // Optional: path of the model to load, relative to the asset directory.
    if let Some(model) = std::env::args().nth(1) {
        config.model_file = model;
    }
    vantage::run(config)
}
