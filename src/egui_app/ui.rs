//! egui renderer for the application UI.

use eframe::egui::{
    self, Align2, Color32, FontId, Frame, Margin, RichText, Stroke, StrokeKind, Ui,
};

use crate::egui_app::controller::AppController;
use crate::egui_app::state::PredictOutcome;

pub const MIN_VIEWPORT_SIZE: egui::Vec2 = egui::vec2(960.0, 640.0);

const AT_RISK_COLOR: Color32 = Color32::from_rgb(220, 80, 90);
const SAFE_COLOR: Color32 = Color32::from_rgb(110, 190, 130);
const BAR_COLOR: Color32 = Color32::from_rgb(255, 99, 132);

/// Renders the egui UI using the shared controller state.
pub struct EguiApp {
    controller: AppController,
    visuals_set: bool,
}

impl EguiApp {
    /// Create a new egui app, loading persisted configuration.
    pub fn new() -> Result<Self, String> {
        let mut controller = AppController::new();
        controller
            .load_configuration()
            .map_err(|err| format!("Failed to load config: {err}"))?;
        Ok(Self {
            controller,
            visuals_set: false,
        })
    }

    fn apply_visuals(&mut self, ctx: &egui::Context) {
        if self.visuals_set {
            return;
        }
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = Color32::from_rgb(12, 12, 12);
        visuals.panel_fill = Color32::from_rgb(16, 16, 16);
        visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(16, 16, 16);
        ctx.set_visuals(visuals);
        self.visuals_set = true;
    }

    fn show_pending_alert(&mut self) {
        if let Some(message) = self.controller.ui.pending_alert.take() {
            rfd::MessageDialog::new()
                .set_title("Riskview")
                .set_description(&message)
                .set_level(rfd::MessageLevel::Warning)
                .show();
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar")
            .frame(Frame::NONE.fill(Color32::from_rgb(24, 24, 24)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new("Student Dropout Prediction").color(Color32::WHITE));
                    ui.add_space(8.0);
                    ui.separator();
                    ui.label(
                        RichText::new(self.controller.base_url().to_string())
                            .color(Color32::GRAY),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui
                            .button(RichText::new("Close").color(Color32::WHITE))
                            .clicked()
                        {
                            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        }
                    });
                });
            });
    }

    fn render_status(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar")
            .frame(Frame::NONE.fill(Color32::from_rgb(0, 0, 0)))
            .show(ctx, |ui| {
                let status = &self.controller.ui.status;
                ui.horizontal(|ui| {
                    ui.add_space(8.0);
                    ui.painter().circle_filled(
                        ui.cursor().min + egui::vec2(9.0, 11.0),
                        9.0,
                        status.badge_color,
                    );
                    ui.add_space(8.0);
                    ui.label(RichText::new(&status.badge_label).color(Color32::WHITE));
                    ui.separator();
                    ui.label(RichText::new(&status.text).color(Color32::WHITE));
                });
            });
    }

    fn render_predict_form(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Single prediction").color(Color32::WHITE));
        ui.add_space(6.0);
        egui::Grid::new("predict_form")
            .num_columns(2)
            .spacing(egui::vec2(8.0, 6.0))
            .show(ui, |ui| {
                ui.label("Average score");
                ui.text_edit_singleline(&mut self.controller.ui.form.diem_tb);
                ui.end_row();
                ui.label("Failed credits");
                ui.text_edit_singleline(&mut self.controller.ui.form.tin_chi_rot);
                ui.end_row();
                ui.label("Retaken courses");
                ui.text_edit_singleline(&mut self.controller.ui.form.so_mon_hoc_lai);
                ui.end_row();
            });
        ui.add_space(6.0);
        let submit = ui.add_enabled(
            !self.controller.predict_in_flight(),
            egui::Button::new(RichText::new("Predict").color(Color32::WHITE)),
        );
        if submit.clicked() {
            self.controller.submit_prediction();
        }
        if self.controller.ui.form.in_flight {
            ui.add_space(4.0);
            ui.spinner();
        }
        if let Some(outcome) = self.controller.ui.form.outcome.clone() {
            ui.add_space(6.0);
            match outcome {
                PredictOutcome::Verdict {
                    verdict,
                    probability,
                    at_risk,
                } => {
                    let color = if at_risk { AT_RISK_COLOR } else { SAFE_COLOR };
                    ui.label(RichText::new(verdict).color(color).strong());
                    ui.label(
                        RichText::new(format!("Dropout probability: {probability}"))
                            .color(Color32::LIGHT_GRAY),
                    );
                }
                PredictOutcome::Error(message) => {
                    ui.label(RichText::new(message).color(AT_RISK_COLOR));
                }
            }
        }
    }

    fn render_upload_panel(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Batch prediction").color(Color32::WHITE));
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui
                .button(RichText::new("Choose file").color(Color32::WHITE))
                .clicked()
            {
                self.controller.choose_batch_file();
            }
            let name = self
                .controller
                .ui
                .upload
                .selected_file
                .as_ref()
                .and_then(|path| path.file_name())
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "No file selected".to_string());
            ui.label(RichText::new(name).color(Color32::GRAY));
        });
        ui.add_space(4.0);
        let can_upload = self.controller.ui.upload.selected_file.is_some();
        let upload = ui.add_enabled(
            can_upload,
            egui::Button::new(RichText::new("Upload and predict").color(Color32::WHITE)),
        );
        if upload.clicked() {
            self.controller.begin_upload();
        }
        if self.controller.ui.upload.in_flight {
            ui.add_space(4.0);
            ui.spinner();
        }
        if let Some(error) = &self.controller.ui.upload.error {
            ui.add_space(4.0);
            ui.label(RichText::new(error).color(AT_RISK_COLOR));
        }
    }

    fn render_export_panel(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Export").color(Color32::WHITE));
        ui.add_space(6.0);
        if ui
            .button(RichText::new("Download spreadsheet").color(Color32::WHITE))
            .clicked()
        {
            self.controller.export_results();
        }
    }

    fn render_side_panel(&mut self, ui: &mut Ui) {
        ui.vertical(|ui| {
            self.render_predict_form(ui);
            ui.add_space(12.0);
            ui.separator();
            ui.add_space(12.0);
            self.render_upload_panel(ui);
            ui.add_space(12.0);
            ui.separator();
            ui.add_space(12.0);
            self.render_export_panel(ui);
        });
    }

    fn render_stats(&mut self, ui: &mut Ui) {
        let Some(stats) = self.controller.ui.results.stats.clone() else {
            return;
        };
        let frame = Frame::NONE
            .fill(Color32::from_rgb(20, 20, 20))
            .stroke(Stroke::new(1.0, Color32::from_rgb(48, 48, 48)))
            .inner_margin(Margin::symmetric(10, 8));
        frame.show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new("Students").color(Color32::GRAY));
                ui.label(RichText::new(&stats.total).color(Color32::WHITE).strong());
                ui.separator();
                ui.label(RichText::new("Mean score").color(Color32::GRAY));
                ui.label(
                    RichText::new(&stats.mean_score)
                        .color(Color32::WHITE)
                        .strong(),
                );
                ui.separator();
                ui.label(RichText::new("Dropout rate").color(Color32::GRAY));
                ui.label(
                    RichText::new(&stats.dropout_rate)
                        .color(AT_RISK_COLOR)
                        .strong(),
                );
            });
        });
    }

    fn render_results_table(&mut self, ui: &mut Ui) {
        let rows = self.controller.ui.results.rows.clone();
        if rows.is_empty() {
            ui.label(RichText::new("No results yet").color(Color32::GRAY));
            return;
        }
        egui::ScrollArea::vertical()
            .id_salt("results_scroll")
            .max_height(320.0)
            .show(ui, |ui| {
                egui::Grid::new("results_table")
                    .num_columns(8)
                    .striped(true)
                    .spacing(egui::vec2(16.0, 6.0))
                    .show(ui, |ui| {
                        for header in [
                            "#", "Student ID", "Full name", "Class", "Score", "Verdict",
                            "Probability", "",
                        ] {
                            ui.label(RichText::new(header).color(Color32::GRAY));
                        }
                        ui.end_row();
                        for row in &rows {
                            ui.label(&row.stt);
                            ui.label(&row.masv);
                            ui.label(&row.hoten);
                            ui.label(&row.lop);
                            ui.label(&row.diem_tb);
                            let color = if row.at_risk { AT_RISK_COLOR } else { SAFE_COLOR };
                            ui.label(RichText::new(&row.verdict).color(color));
                            ui.label(&row.probability);
                            if ui
                                .button(RichText::new("View").color(Color32::WHITE))
                                .clicked()
                            {
                                self.controller.open_detail(&row.masv);
                            }
                            ui.end_row();
                        }
                    });
            });
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if self.controller.ui.results.show_more_visible
                && ui
                    .button(RichText::new("Show more").color(Color32::WHITE))
                    .clicked()
            {
                self.controller.show_more();
            }
            if self.controller.ui.results.show_less_visible
                && ui
                    .button(RichText::new("Show less").color(Color32::WHITE))
                    .clicked()
            {
                self.controller.show_less();
            }
        });
    }

    fn render_chart(&mut self, ui: &mut Ui) {
        let Some(chart) = self.controller.ui.results.chart.clone() else {
            return;
        };
        if chart.bars.is_empty() {
            return;
        }
        ui.label(RichText::new("Dropout rate by class").color(Color32::WHITE));
        ui.add_space(6.0);
        let desired = egui::vec2(ui.available_width(), 220.0);
        let (rect, _response) = ui.allocate_exact_size(desired, egui::Sense::hover());
        let painter = ui.painter();
        painter.rect_filled(rect, 6.0, Color32::from_rgb(12, 12, 12));
        painter.rect_stroke(
            rect,
            6.0,
            Stroke::new(1.0, Color32::from_rgb(64, 64, 64)),
            StrokeKind::Inside,
        );

        let label_height = 18.0;
        let value_height = 16.0;
        let plot_top = rect.top() + value_height + 6.0;
        let plot_bottom = rect.bottom() - label_height - 6.0;
        let plot_height = (plot_bottom - plot_top).max(1.0);
        let slot_width = rect.width() / chart.bars.len() as f32;
        let bar_width = (slot_width * 0.6).min(80.0);

        for (index, bar) in chart.bars.iter().enumerate() {
            let center_x = rect.left() + slot_width * (index as f32 + 0.5);
            // Rates are percentages on a fixed 0-100 scale.
            let fraction = (bar.rate / 100.0).clamp(0.0, 1.0) as f32;
            let bar_top = plot_bottom - plot_height * fraction;
            let bar_rect = egui::Rect::from_min_max(
                egui::pos2(center_x - bar_width / 2.0, bar_top),
                egui::pos2(center_x + bar_width / 2.0, plot_bottom),
            );
            painter.rect_filled(bar_rect, 2.0, BAR_COLOR);
            painter.text(
                egui::pos2(center_x, bar_top - 4.0),
                Align2::CENTER_BOTTOM,
                &bar.rate_label,
                FontId::proportional(12.0),
                Color32::LIGHT_GRAY,
            );
            painter.text(
                egui::pos2(center_x, rect.bottom() - 4.0),
                Align2::CENTER_BOTTOM,
                &bar.label,
                FontId::proportional(12.0),
                Color32::GRAY,
            );
        }
    }

    fn render_center(&mut self, ui: &mut Ui) {
        ui.vertical(|ui| {
            self.render_stats(ui);
            ui.add_space(8.0);
            self.render_results_table(ui);
            ui.add_space(12.0);
            self.render_chart(ui);
        });
    }

    fn render_detail_window(&mut self, ctx: &egui::Context) {
        if !self.controller.ui.detail.open {
            return;
        }
        let Some(view) = self.controller.ui.detail.view.clone() else {
            return;
        };
        let mut open = true;
        egui::Window::new(&view.title)
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Grid::new("detail_basic")
                    .num_columns(2)
                    .spacing(egui::vec2(12.0, 4.0))
                    .show(ui, |ui| {
                        for (label, value) in &view.basic {
                            ui.label(RichText::new(*label).color(Color32::GRAY));
                            ui.label(RichText::new(value).color(Color32::WHITE));
                            ui.end_row();
                        }
                    });
                ui.add_space(6.0);
                ui.separator();
                ui.add_space(6.0);
                egui::Grid::new("detail_outcome")
                    .num_columns(2)
                    .spacing(egui::vec2(12.0, 4.0))
                    .show(ui, |ui| {
                        for (label, value) in &view.outcome {
                            ui.label(RichText::new(*label).color(Color32::GRAY));
                            ui.label(RichText::new(value).color(Color32::WHITE));
                            ui.end_row();
                        }
                        ui.label(RichText::new("Assessment").color(Color32::GRAY));
                        let color = if view.assessment_at_risk {
                            AT_RISK_COLOR
                        } else {
                            SAFE_COLOR
                        };
                        ui.label(RichText::new(&view.assessment).color(color).strong());
                        ui.end_row();
                    });
                if !view.fallback.is_empty() {
                    ui.add_space(6.0);
                    ui.separator();
                    ui.add_space(6.0);
                    egui::ScrollArea::vertical()
                        .id_salt("detail_fallback_scroll")
                        .max_height(200.0)
                        .show(ui, |ui| {
                            egui::Grid::new("detail_fallback")
                                .num_columns(2)
                                .striped(true)
                                .spacing(egui::vec2(12.0, 4.0))
                                .show(ui, |ui| {
                                    for (key, value) in &view.fallback {
                                        ui.label(RichText::new(key).color(Color32::GRAY));
                                        ui.label(RichText::new(value).color(Color32::WHITE));
                                        ui.end_row();
                                    }
                                });
                        });
                }
            });
        if !open {
            self.controller.close_detail();
        }
    }
}

impl eframe::App for EguiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_visuals(ctx);
        self.controller.poll_background_jobs();
        self.show_pending_alert();
        self.render_top_bar(ctx);
        egui::SidePanel::left("actions")
            .resizable(false)
            .min_width(260.0)
            .max_width(300.0)
            .show(ctx, |ui| self.render_side_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_center(ui);
        });
        self.render_detail_window(ctx);
        self.render_status(ctx);
        ctx.request_repaint();
    }
}
