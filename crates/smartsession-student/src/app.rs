use std::sync::Arc;

use egui::{
    Align, Align2, Color32, FontFamily, FontId, Frame, Layout, Margin, RichText, ScrollArea,
    Stroke, TextureHandle, TextureOptions, Vec2,
};
use image::RgbImage;
use smartsession_core::{StatusTone, StudentView};
use tokio::sync::mpsc;

use crate::state::{lock, SharedState};

// ── Colours ───────────────────────────────────────────────────────────────────

const BG_PANEL:  Color32 = Color32::from_rgb(243, 244, 246);
const BG_CARD:   Color32 = Color32::WHITE;
const BORDER:    Color32 = Color32::from_rgb(229, 231, 235);
const TEXT_DIM:  Color32 = Color32::from_rgb(107, 114, 128);
const TEXT_NORM: Color32 = Color32::from_rgb(31, 41, 55);
const ONLINE:    Color32 = Color32::from_rgb(34, 197, 94);
const OFFLINE:   Color32 = Color32::from_rgb(239, 68, 68);

fn tone_color(tone: StatusTone) -> Color32 {
    let [r, g, b] = tone.rgb();
    Color32::from_rgb(r, g, b)
}

// ── App struct ────────────────────────────────────────────────────────────────

pub struct StudentApp {
    state:       SharedState,
    preview_tex: Option<TextureHandle>,
    preview_seq: u64,
    show_logs:   bool,
    /// Dropped with the app; the session task treats that as teardown.
    _shutdown:   mpsc::Sender<()>,
}

impl StudentApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: SharedState, shutdown: mpsc::Sender<()>) -> Self {
        let mut visuals = egui::Visuals::light();
        visuals.panel_fill = BG_PANEL;
        visuals.window_fill = BG_PANEL;
        cc.egui_ctx.set_visuals(visuals);

        Self {
            state,
            preview_tex: None,
            preview_seq: 0,
            show_logs:   false,
            _shutdown:   shutdown,
        }
    }

    fn upload_preview(&mut self, ctx: &egui::Context, seq: u64, frame: Option<Arc<RgbImage>>) {
        if seq == self.preview_seq {
            return;
        }
        let Some(frame) = frame else { return };
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgb(size, frame.as_raw());
        match &mut self.preview_tex {
            Some(tex) => tex.set(image, TextureOptions::LINEAR),
            None => self.preview_tex = Some(ctx.load_texture("self-view", image, TextureOptions::LINEAR)),
        }
        self.preview_seq = seq;
    }
}

// ── eframe::App implementation ────────────────────────────────────────────────

impl eframe::App for StudentApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Snapshot state to avoid holding the lock across rendering
        let snap = {
            let s = lock(&self.state);
            StateSnapshot {
                view:          s.view.clone(),
                preview:       s.preview.clone(),
                preview_seq:   s.preview_seq,
                frames_sent:   s.frames_sent,
                camera_active: s.camera_active,
                logs:          s.logs.iter().cloned().collect(),
            }
        };
        self.upload_preview(ctx, snap.preview_seq, snap.preview.clone());

        egui::TopBottomPanel::top("header")
            .frame(Frame::none().fill(BG_CARD).inner_margin(Margin::symmetric(12.0, 8.0)))
            .show(ctx, |ui| render_header(ui, ctx, &snap.view));

        egui::SidePanel::right("sidebar")
            .exact_width(240.0)
            .resizable(false)
            .frame(Frame::none().fill(BG_PANEL).inner_margin(Margin::symmetric(8.0, 8.0)))
            .show(ctx, |ui| {
                render_instructor_card(ui, &snap.view);
                ui.add_space(8.0);
                render_classmates_card(ui, &snap.view);
            });

        egui::CentralPanel::default()
            .frame(Frame::none().fill(BG_PANEL).inner_margin(Margin::symmetric(8.0, 8.0)))
            .show(ctx, |ui| {
                render_video(ui, &snap, self.preview_tex.as_ref());
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(format!("{} frames sent", snap.frames_sent))
                            .color(TEXT_DIM)
                            .font(FontId::new(11.5, FontFamily::Proportional)),
                    );
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.checkbox(&mut self.show_logs, RichText::new("log").color(TEXT_DIM));
                    });
                });
                if self.show_logs {
                    render_log_panel(ui, &snap.logs);
                }
            });
    }
}

// ── Rendering helpers ─────────────────────────────────────────────────────────

fn render_header(ui: &mut egui::Ui, ctx: &egui::Context, view: &StudentView) {
    ui.horizontal(|ui| {
        ui.vertical(|ui| {
            ui.label(RichText::new("Student Session").strong().size(17.0).color(TEXT_NORM));
            ui.label(
                RichText::new(format!("ID: {} • {}", view.identity.id, view.identity.name))
                    .color(TEXT_DIM)
                    .font(FontId::new(11.5, FontFamily::Proportional)),
            );
        });
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            let end = egui::Button::new(RichText::new("End Session").color(Color32::from_rgb(220, 38, 38)))
                .fill(Color32::from_rgb(254, 242, 242));
            if ui.add(end).clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    });
}

fn render_video(ui: &mut egui::Ui, snap: &StateSnapshot, texture: Option<&TextureHandle>) {
    let width = ui.available_width();
    let height = (width * 9.0 / 16.0).min(ui.available_height() - 40.0).max(120.0);
    let (rect, _) = ui.allocate_exact_size(Vec2::new(width, height), egui::Sense::hover());
    let painter = ui.painter_at(rect);

    painter.rect_filled(rect, 12.0, Color32::BLACK);

    match texture {
        Some(tex) if snap.preview.is_some() => {
            // Fit the frame inside the rect, mirrored like a mirror.
            let tex_size = tex.size_vec2();
            let scale = (rect.width() / tex_size.x).min(rect.height() / tex_size.y);
            let image_rect = egui::Rect::from_center_size(rect.center(), tex_size * scale);
            let uv = egui::Rect::from_min_max(egui::pos2(1.0, 0.0), egui::pos2(0.0, 1.0));
            painter.image(tex.id(), image_rect, uv, Color32::WHITE);
        }
        _ => {
            let text = if snap.camera_active {
                "Waiting for camera…"
            } else {
                snap.view.feedback.message.as_str()
            };
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                text,
                FontId::new(14.0, FontFamily::Proportional),
                Color32::from_rgb(200, 200, 200),
            );
        }
    }

    let tone = snap.view.border_tone();
    let stroke_width = if tone == StatusTone::Neutral { 2.0 } else { 4.0 };
    painter.rect_stroke(rect, 12.0, Stroke::new(stroke_width, tone_color(tone)));

    // Connection badge (top-left)
    let status = &snap.view.status;
    let badge = egui::Rect::from_min_size(rect.min + Vec2::new(12.0, 12.0), Vec2::new(150.0, 22.0));
    painter.rect_filled(badge, 11.0, Color32::from_black_alpha(150));
    let dot_color = if status.is_connected() { Color32::from_rgb(74, 222, 128) } else { OFFLINE };
    painter.circle_filled(badge.left_center() + Vec2::new(11.0, 0.0), 3.5, dot_color);
    painter.text(
        badge.left_center() + Vec2::new(20.0, 0.0),
        Align2::LEFT_CENTER,
        status.label(),
        FontId::new(10.5, FontFamily::Proportional),
        Color32::WHITE,
    );
}

fn render_instructor_card(ui: &mut egui::Ui, view: &StudentView) {
    card(ui, |ui| {
        ui.label(section_title("INSTRUCTOR STATUS"));
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let online = view.teacher.is_online();
            let (rect, _) = ui.allocate_exact_size(Vec2::splat(10.0), egui::Sense::hover());
            ui.painter()
                .circle_filled(rect.center(), 4.0, if online { ONLINE } else { OFFLINE });
            ui.label(
                RichText::new(if online { "Online" } else { "Offline" })
                    .strong()
                    .color(if online { Color32::from_rgb(21, 128, 61) } else { TEXT_DIM }),
            );
        });
    });
}

fn render_classmates_card(ui: &mut egui::Ui, view: &StudentView) {
    card(ui, |ui| {
        ui.horizontal(|ui| {
            ui.label(section_title("CLASSMATES"));
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                ui.label(RichText::new(view.peers.len().to_string()).color(TEXT_DIM).small());
            });
        });
        ui.add_space(4.0);

        if view.peers.is_empty() {
            ui.vertical_centered(|ui| {
                ui.label(RichText::new("No others").italics().color(Color32::from_rgb(156, 163, 175)));
            });
            return;
        }

        ScrollArea::vertical().id_salt("peers").auto_shrink([false, true]).show(ui, |ui| {
            for peer in &view.peers {
                Frame::none()
                    .fill(Color32::from_rgb(249, 250, 251))
                    .stroke(Stroke::new(1.0, Color32::from_rgb(243, 244, 246)))
                    .rounding(egui::Rounding::same(4.0))
                    .inner_margin(Margin::symmetric(6.0, 4.0))
                    .show(ui, |ui| {
                        ui.set_min_width(ui.available_width());
                        ui.horizontal(|ui| {
                            ui.label(
                                RichText::new("ST")
                                    .font(FontId::new(10.0, FontFamily::Proportional))
                                    .strong()
                                    .color(Color32::from_rgb(37, 99, 235)),
                            );
                            ui.label(RichText::new(view.peer_label(peer)).color(TEXT_NORM).small());
                        });
                    });
                ui.add_space(2.0);
            }
        });
    });
}

fn render_log_panel(ui: &mut egui::Ui, logs: &[String]) {
    Frame::none()
        .fill(BG_CARD)
        .inner_margin(Margin::symmetric(8.0, 6.0))
        .stroke(Stroke::new(1.0, BORDER))
        .rounding(egui::Rounding::same(6.0))
        .show(ui, |ui| {
            ScrollArea::vertical()
                .id_salt("log_scroll")
                .max_height(120.0)
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
        });
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn section_title(text: &str) -> RichText {
    RichText::new(text)
        .font(FontId::new(10.0, FontFamily::Proportional))
        .strong()
        .color(TEXT_DIM)
}

fn card(ui: &mut egui::Ui, add_contents: impl FnOnce(&mut egui::Ui)) {
    Frame::none()
        .fill(BG_CARD)
        .inner_margin(Margin::symmetric(10.0, 8.0))
        .rounding(egui::Rounding::same(8.0))
        .stroke(Stroke::new(1.0, BORDER))
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            add_contents(ui);
        });
}

// ── Snapshot (to avoid holding lock during paint) ─────────────────────────────

struct StateSnapshot {
    view:          StudentView,
    preview:       Option<Arc<RgbImage>>,
    preview_seq:   u64,
    frames_sent:   u64,
    camera_active: bool,
    logs:          Vec<String>,
}
