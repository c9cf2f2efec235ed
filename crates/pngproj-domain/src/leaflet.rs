//! Manifest entries describing exported layers to the Leaflet page.

use serde::{Deserialize, Serialize};

use crate::extent::Extent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub title: String,
    pub file: String,
    pub bounds: Extent,
    pub opacity: f64,
}

impl LayerInfo {
    pub fn csv_line(&self) -> String {
        format!("{},{}\n", self.title, self.file)
    }

    pub fn js_object(&self) -> String {
        format!(
            "   {{title: \"{}\", file: \"{}\", bounds: {}, opacity: {}}}\n",
            escape_js(&self.title),
            escape_js(&self.file),
            self.bounds.leaflet_bounds(),
            self.opacity
        )
    }
}

/// Accumulates layers in export order and renders both manifest files.
#[derive(Debug, Clone, Default)]
pub struct LayerManifest {
    layers: Vec<LayerInfo>,
}

impl LayerManifest {
    pub const CSV_FILE: &'static str = "data_file.csv";
    pub const JS_FILE: &'static str = "data_file.js";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: LayerInfo) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    pub fn render_csv(&self) -> String {
        self.layers.iter().map(LayerInfo::csv_line).collect()
    }

    pub fn render_js(&self) -> String {
        let mut out =
            String::from("/* This file was generated by pngproj leaflet export. */\n\n");
        out.push_str("var layerInfos = [\n");
        let entries: Vec<String> = self.layers.iter().map(LayerInfo::js_object).collect();
        out.push_str(&entries.join(","));
        out.push_str("];\n");
        out
    }
}

fn escape_js(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
