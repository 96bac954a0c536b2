//! SVG visualization of solutions.
//!
//! Renders a Steiner selection over its graph, or one colored polyline per
//! vehicle route over the visit points.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use crate::instance::{SteinerInstance, VrpInstance};
use crate::solution::{RoutePlan, SteinerTree};

#[cfg(feature = "resvg")]
use resvg::render;
#[cfg(feature = "resvg")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "resvg")]
use resvg::usvg;
#[cfg(feature = "resvg")]
use resvg::usvg::TreeParsing;
#[cfg(feature = "resvg")]
use resvg::FitTo;

const ROUTE_COLORS: [&str; 6] =
    ["#3498db", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22"];

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Node radius
    pub node_radius: f64,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer { width: 800.0, height: 800.0, margin: 50.0, node_radius: 8.0 }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a Steiner selection. Vertices are laid out on a circle since
    /// the instance format carries no coordinates; selected edges are drawn
    /// solid, unselected edges faint.
    pub fn generate_steiner_svg(&self, instance: &SteinerInstance, tree: &SteinerTree) -> String {
        let mut svg = String::new();
        svg.push_str(&self.header());

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Instance: {} | Weight: {:.2} | Connected: {}</text>
"##,
            self.margin, instance.name, tree.total_weight, tree.connects_terminals
        ));

        let n = instance.num_vertices;
        let cx = self.width / 2.0;
        let cy = self.height / 2.0;
        let radius = (self.width.min(self.height)) / 2.0 - self.margin;
        let position = |v: usize| -> (f64, f64) {
            let angle = 2.0 * std::f64::consts::PI * v as f64 / n as f64;
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        };

        let selected: std::collections::HashSet<(usize, usize)> = tree
            .edges
            .iter()
            .flat_map(|&(u, v, _)| [(u, v), (v, u)])
            .collect();

        for e in &instance.edges {
            let (x1, y1) = position(e.u);
            let (x2, y2) = position(e.v);
            let class = if selected.contains(&(e.u, e.v)) { "edge" } else { "faint" };
            svg.push_str(&format!(
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" class="{}"/>
"#,
                x1, y1, x2, y2, class
            ));
        }

        for v in 0..n {
            let (x, y) = position(v);
            let class = if v == instance.root() {
                "depot"
            } else if instance.terminals.contains(&v) {
                "terminal"
            } else {
                "node"
            };
            svg.push_str(&format!(
                r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="{}"/>
"##,
                x, y, self.node_radius, class
            ));
            svg.push_str(&format!(
                r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                x,
                y - self.node_radius - 3.0,
                v + 1
            ));
        }

        svg.push_str("</svg>");
        svg
    }

    /// Render one colored closed polyline per vehicle route.
    pub fn generate_routes_svg(&self, instance: &VrpInstance, plan: &RoutePlan) -> String {
        let mut svg = String::new();
        svg.push_str(&self.header());

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Instance: {} | Makespan: {:.2} min</text>
"##,
            self.margin,
            instance.name,
            plan.makespan()
        ));

        let (min_x, max_x, min_y, max_y) = self.bounds(instance);
        let scale_x = (self.width - 2.0 * self.margin) / (max_x - min_x).max(1.0);
        let scale_y = (self.height - 2.0 * self.margin) / (max_y - min_y).max(1.0);
        let scale = scale_x.min(scale_y);
        let transform = |x: f64, y: f64| -> (f64, f64) {
            let tx = self.margin + (x - min_x) * scale;
            let ty = self.height - self.margin - (y - min_y) * scale;
            (tx, ty)
        };

        for route in &plan.routes {
            let color = ROUTE_COLORS[route.vehicle % ROUTE_COLORS.len()];
            for pair in route.sequence.windows(2) {
                let (x1, y1) = transform(instance.points[pair[0]].x, instance.points[pair[0]].y);
                let (x2, y2) = transform(instance.points[pair[1]].x, instance.points[pair[1]].y);
                svg.push_str(&format!(
                    r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="2"/>
"#,
                    x1, y1, x2, y2, color
                ));
            }
        }

        for (i, p) in instance.points.iter().enumerate() {
            let (x, y) = transform(p.x, p.y);
            let class = if i == 0 { "depot" } else { "node" };
            svg.push_str(&format!(
                r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="{}"/>
"##,
                x, y, self.node_radius, class
            ));
            svg.push_str(&format!(
                r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                x,
                y - self.node_radius - 3.0,
                i
            ));
        }

        let legend_y = self.height - 30.0;
        for route in &plan.routes {
            let color = ROUTE_COLORS[route.vehicle % ROUTE_COLORS.len()];
            let x = self.margin + route.vehicle as f64 * 110.0;
            svg.push_str(&format!(
                r##"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>
<text x="{}" y="{}" class="label">Vehicle {}</text>
"##,
                x,
                legend_y,
                color,
                x + 20.0,
                legend_y + 12.0,
                route.vehicle
            ));
        }

        svg.push_str("</svg>");
        svg
    }

    fn header(&self) -> String {
        format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .node {{ fill: #95a5a6; stroke: #7f8c8d; stroke-width: 2; }}
    .depot {{ fill: #e74c3c; stroke: #c0392b; stroke-width: 2; }}
    .terminal {{ fill: #2ecc71; stroke: #27ae60; stroke-width: 2; }}
    .edge {{ stroke: #34495e; stroke-width: 3; fill: none; }}
    .faint {{ stroke: #bdc3c7; stroke-width: 1; fill: none; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        )
    }

    fn bounds(&self, instance: &VrpInstance) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in &instance.points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        (min_x, max_x, min_y, max_y)
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG: native resvg renderer when the feature is enabled,
    /// otherwise external converters (`rsvg-convert`, `magick`, `inkscape`).
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> std::io::Result<()> {
        let path = path.as_ref();

        #[cfg(feature = "resvg")]
        {
            let opt = usvg::Options::default();
            let rtree = usvg::Tree::from_str(svg, &opt).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, format!("usvg parse error: {}", e))
            })?;
            let mut pixmap = Pixmap::new(self.width as u32, self.height as u32).ok_or_else(
                || std::io::Error::new(std::io::ErrorKind::Other, "failed to create pixmap"),
            )?;
            render(&rtree, FitTo::Original, Transform::default(), pixmap.as_mut()).ok_or_else(
                || std::io::Error::new(std::io::ErrorKind::Other, "resvg render failed"),
            )?;
            pixmap.save_png(path).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, format!("save_png failed: {}", e))
            })?;
            return Ok(());
        }

        #[cfg(not(feature = "resvg"))]
        {
            let tmp_svg = path.with_extension("svg.tmp");
            std::fs::write(&tmp_svg, svg)?;

            let converters: [(&str, Vec<String>); 3] = [
                (
                    "rsvg-convert",
                    vec![
                        "-o".to_string(),
                        path.to_string_lossy().to_string(),
                        tmp_svg.to_string_lossy().to_string(),
                    ],
                ),
                (
                    "magick",
                    vec![
                        "convert".to_string(),
                        tmp_svg.to_string_lossy().to_string(),
                        path.to_string_lossy().to_string(),
                    ],
                ),
                (
                    "inkscape",
                    vec![
                        tmp_svg.to_string_lossy().to_string(),
                        "--export-type=png".to_string(),
                        "--export-filename".to_string(),
                        path.to_string_lossy().to_string(),
                    ],
                ),
            ];
            for (program, args) in &converters {
                if let Ok(status) = Command::new(program).args(args).status() {
                    if status.success() {
                        let _ = std::fs::remove_file(&tmp_svg);
                        return Ok(());
                    }
                }
            }
            let _ = std::fs::remove_file(&tmp_svg);
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no SVG->PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
            ))
        }
    }
}
