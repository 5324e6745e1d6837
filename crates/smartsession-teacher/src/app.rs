use std::collections::HashMap;

use egui::{
    Align, Color32, FontFamily, FontId, Frame, Layout, Margin, RichText, ScrollArea, Stroke,
    TextureHandle, TextureOptions, Vec2,
};
use smartsession_core::view::{engagement_fraction, engagement_is_low, engagement_percent, initial};
use smartsession_core::{ConnectionStatus, StatusTone, TelemetryData, Thumbnail};
use tokio::sync::mpsc;

use crate::state::{lock, SharedState};

// ── Colours ───────────────────────────────────────────────────────────────────

const BG_PANEL:  Color32 = Color32::from_rgb(249, 250, 251);
const BG_CARD:   Color32 = Color32::WHITE;
const BORDER:    Color32 = Color32::from_rgb(229, 231, 235);
const TEXT_DIM:  Color32 = Color32::from_rgb(107, 114, 128);
const TEXT_NORM: Color32 = Color32::from_rgb(17, 24, 39);
const BAR_LOW:   Color32 = Color32::from_rgb(239, 68, 68);
const BAR_OK:    Color32 = Color32::from_rgb(59, 130, 246);

const CARD_WIDTH: f32 = 260.0;

fn tone_color(tone: StatusTone) -> Color32 {
    let [r, g, b] = tone.rgb();
    Color32::from_rgb(r, g, b)
}

// ── App struct ────────────────────────────────────────────────────────────────

pub struct TeacherApp {
    state:     SharedState,
    /// Per-student texture plus the thumbnail `seq` it was uploaded from.
    textures:  HashMap<String, (u64, TextureHandle)>,
    show_logs: bool,
    _shutdown: mpsc::Sender<()>,
}

impl TeacherApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: SharedState, shutdown: mpsc::Sender<()>) -> Self {
        let mut visuals = egui::Visuals::light();
        visuals.panel_fill = BG_PANEL;
        cc.egui_ctx.set_visuals(visuals);

        Self { state, textures: HashMap::new(), show_logs: false, _shutdown: shutdown }
    }

    /// Upload changed thumbnails and forget textures of departed students.
    fn sync_textures(&mut self, ctx: &egui::Context, thumbs: &[(String, Thumbnail)], live: &[String]) {
        for (id, thumb) in thumbs {
            if self.textures.get(id).is_some_and(|(seq, _)| *seq == thumb.seq) {
                continue;
            }
            let size = [thumb.width as usize, thumb.height as usize];
            if thumb.rgba.len() != size[0] * size[1] * 4 {
                continue;
            }
            let image = egui::ColorImage::from_rgba_unmultiplied(size, &thumb.rgba);
            match self.textures.get_mut(id) {
                Some((seq, tex)) => {
                    tex.set(image, TextureOptions::LINEAR);
                    *seq = thumb.seq;
                }
                None => {
                    let tex = ctx.load_texture(format!("student-{id}"), image, TextureOptions::LINEAR);
                    self.textures.insert(id.clone(), (thumb.seq, tex));
                }
            }
        }
        self.textures.retain(|id, _| live.contains(id));
    }
}

// ── eframe::App implementation ────────────────────────────────────────────────

impl eframe::App for TeacherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Snapshot state to avoid holding the lock across rendering.
        // Thumbnails are only cloned when their seq moved on.
        let snap = {
            let s = lock(&self.state);
            let students: Vec<TelemetryData> = s.roster.students().cloned().collect();
            let ids: Vec<String> = students.iter().map(|d| d.student_id.clone()).collect();
            let thumbs: Vec<(String, Thumbnail)> = ids
                .iter()
                .filter_map(|id| {
                    let t = s.roster.thumbnail(id)?;
                    let stale = self.textures.get(id).map_or(true, |(seq, _)| *seq != t.seq);
                    stale.then(|| (id.clone(), t.clone()))
                })
                .collect();
            StateSnapshot {
                class_id: s.class_id.clone(),
                status:   s.roster.status.clone(),
                students,
                ids,
                thumbs,
                logs:     s.logs.iter().cloned().collect(),
            }
        };
        self.sync_textures(ctx, &snap.thumbs, &snap.ids);

        egui::TopBottomPanel::top("header")
            .frame(Frame::none().fill(BG_CARD).inner_margin(Margin::symmetric(16.0, 10.0)))
            .show(ctx, |ui| render_header(ui, ctx, &snap));

        if self.show_logs {
            egui::TopBottomPanel::bottom("logs")
                .resizable(true)
                .default_height(140.0)
                .frame(Frame::none().fill(BG_CARD).inner_margin(Margin::symmetric(8.0, 6.0)))
                .show(ctx, |ui| render_log_panel(ui, &snap.logs));
        }

        egui::CentralPanel::default()
            .frame(Frame::none().fill(BG_PANEL).inner_margin(Margin::symmetric(16.0, 12.0)))
            .show(ctx, |ui| {
                ui.with_layout(Layout::right_to_left(Align::Min), |ui| {
                    ui.checkbox(&mut self.show_logs, RichText::new("log").color(TEXT_DIM));
                });
                if snap.students.is_empty() {
                    render_empty_state(ui, &snap.class_id);
                    return;
                }
                ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.spacing_mut().item_spacing = Vec2::splat(12.0);
                        for data in &snap.students {
                            let texture = self.textures.get(&data.student_id).map(|(_, t)| t);
                            render_student_card(ui, data, texture);
                        }
                    });
                });
            });
    }
}

// ── Rendering helpers ─────────────────────────────────────────────────────────

fn render_header(ui: &mut egui::Ui, ctx: &egui::Context, snap: &StateSnapshot) {
    ui.horizontal(|ui| {
        ui.vertical(|ui| {
            ui.label(RichText::new("Dashboard").strong().size(20.0).color(TEXT_NORM));
            ui.horizontal(|ui| {
                let color = if snap.status.is_connected() {
                    Color32::from_rgb(34, 197, 94)
                } else {
                    Color32::from_rgb(239, 68, 68)
                };
                let (rect, _) = ui.allocate_exact_size(Vec2::splat(10.0), egui::Sense::hover());
                ui.painter().circle_filled(rect.center(), 4.0, color);
                let text = match &snap.status {
                    ConnectionStatus::Connected => {
                        format!("Live Monitoring • {} Students Active", snap.students.len())
                    }
                    other => format!("{} • {}", other.label(), snap.class_id),
                };
                ui.label(RichText::new(text).color(TEXT_DIM).font(FontId::new(12.0, FontFamily::Proportional)));
            });
        });
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            let end = egui::Button::new(RichText::new("End Class").color(Color32::WHITE))
                .fill(Color32::from_rgb(220, 38, 38));
            if ui.add(end).clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    });
}

fn render_empty_state(ui: &mut egui::Ui, class_id: &str) {
    ui.vertical_centered(|ui| {
        ui.add_space(ui.available_height() * 0.3);
        ui.label(RichText::new("No students connected").size(18.0).strong().color(TEXT_DIM));
        ui.add_space(4.0);
        ui.label(
            RichText::new(format!("Ask students to join the session ID: {class_id}"))
                .color(Color32::from_rgb(156, 163, 175)),
        );
    });
}

fn render_student_card(ui: &mut egui::Ui, data: &TelemetryData, texture: Option<&TextureHandle>) {
    let tone = StatusTone::for_state(data.display_state());
    let accent = tone_color(tone);
    let fill = if tone == StatusTone::Neutral { BG_CARD } else { accent.gamma_multiply(0.08) };

    Frame::none()
        .fill(fill)
        .stroke(Stroke::new(2.0, if tone == StatusTone::Neutral { BORDER } else { accent }))
        .rounding(egui::Rounding::same(12.0))
        .inner_margin(Margin::same(12.0))
        .show(ui, |ui| {
            ui.set_width(CARD_WIDTH);
            ui.vertical(|ui| {
                // Avatar, name, id, state badge
                ui.horizontal(|ui| {
                    let (rect, _) = ui.allocate_exact_size(Vec2::splat(36.0), egui::Sense::hover());
                    ui.painter().circle_filled(rect.center(), 18.0, Color32::from_rgb(219, 234, 254));
                    ui.painter().text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        initial(&data.name),
                        FontId::new(16.0, FontFamily::Proportional),
                        Color32::from_rgb(37, 99, 235),
                    );
                    ui.vertical(|ui| {
                        ui.label(RichText::new(&data.name).strong().color(TEXT_NORM));
                        ui.label(RichText::new(format!("ID: {}", data.student_id)).small().color(TEXT_DIM));
                    });
                    ui.with_layout(Layout::right_to_left(Align::Min), |ui| {
                        Frame::none()
                            .fill(accent)
                            .rounding(egui::Rounding::same(8.0))
                            .inner_margin(Margin::symmetric(6.0, 2.0))
                            .show(ui, |ui| {
                                ui.label(
                                    RichText::new(data.display_state())
                                        .font(FontId::new(10.0, FontFamily::Proportional))
                                        .strong()
                                        .color(Color32::WHITE),
                                );
                            });
                    });
                });
                ui.add_space(8.0);

                render_thumbnail(ui, texture);
                ui.add_space(8.0);

                ui.label(RichText::new("Current Status").small().color(TEXT_DIM));
                ui.label(RichText::new(data.display_state()).strong().color(accent));
                ui.add_space(6.0);

                // Engagement bar
                ui.horizontal(|ui| {
                    ui.label(RichText::new("Engagement").small().color(TEXT_DIM));
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(
                            RichText::new(format!("{}%", engagement_percent(data.engagement_score)))
                                .small()
                                .strong()
                                .color(TEXT_NORM),
                        );
                    });
                });
                let (bar, _) = ui.allocate_exact_size(Vec2::new(ui.available_width(), 8.0), egui::Sense::hover());
                let painter = ui.painter();
                painter.rect_filled(bar, 4.0, Color32::from_rgb(229, 231, 235));
                let mut filled = bar;
                filled.set_width(bar.width() * engagement_fraction(data.engagement_score));
                let bar_color = if engagement_is_low(data.engagement_score) { BAR_LOW } else { BAR_OK };
                painter.rect_filled(filled, 4.0, bar_color);

                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("Confusion {:.2}", data.confusion_index))
                            .small()
                            .color(TEXT_DIM),
                    );
                    if let Some(gaze) = &data.gaze {
                        ui.label(RichText::new(format!("• Gaze {gaze}")).small().color(TEXT_DIM));
                    }
                });
            });
        });
}

fn render_thumbnail(ui: &mut egui::Ui, texture: Option<&TextureHandle>) {
    let size = Vec2::new(ui.available_width(), ui.available_width() * 3.0 / 4.0);
    let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 8.0, Color32::from_rgb(17, 24, 39));
    match texture {
        Some(tex) => {
            let tex_size = tex.size_vec2();
            let scale = (rect.width() / tex_size.x).min(rect.height() / tex_size.y);
            let image_rect = egui::Rect::from_center_size(rect.center(), tex_size * scale);
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(tex.id(), image_rect, uv, Color32::WHITE);
        }
        None => {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No video",
                FontId::new(12.0, FontFamily::Proportional),
                TEXT_DIM,
            );
        }
    }
}

fn render_log_panel(ui: &mut egui::Ui, logs: &[String]) {
    ScrollArea::vertical()
        .id_salt("log_scroll")
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for line in logs {
                let color = if line.starts_with("[ERROR]") {
                    Color32::from_rgb(220, 38, 38)
                } else if line.starts_with("[WARN]") {
                    Color32::from_rgb(202, 138, 4)
                } else {
                    TEXT_DIM
                };
                ui.label(RichText::new(line).font(FontId::new(11.0, FontFamily::Monospace)).color(color));
            }
        });
}

// ── Snapshot (to avoid holding lock during paint) ─────────────────────────────

struct StateSnapshot {
    class_id: String,
    status:   ConnectionStatus,
    students: Vec<TelemetryData>,
    ids:      Vec<String>,
    thumbs:   Vec<(String, Thumbnail)>,
    logs:     Vec<String>,
}
