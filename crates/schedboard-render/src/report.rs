//! Markdown weekly report
//!
//! Section order is fixed: header block, progress table with overall
//! completion rate, completed this week, due next week, delays, footer.

use chrono::NaiveDate;
use schedboard_core::report::WeeklyReport;
use schedboard_core::ScheduleData;

use crate::{RenderError, Renderer};

const RULE: &str = "\n---\n\n";

/// Weekly report renderer for a pinned report date
#[derive(Clone, Debug)]
pub struct WeeklyReportRenderer {
    pub report_date: NaiveDate,
    /// Signature line at the bottom of the report
    pub footer: String,
}

impl WeeklyReportRenderer {
    pub fn new(report_date: NaiveDate) -> Self {
        Self {
            report_date,
            footer: "此報告由 schedboard 自動生成".into(),
        }
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }
}

impl Renderer for WeeklyReportRenderer {
    type Output = String;

    fn render(&self, data: &ScheduleData) -> Result<String, RenderError> {
        let report = WeeklyReport::build(&data.tasks, self.report_date);
        let counts = &report.counts;
        let ymd = |d: NaiveDate| d.format("%Y-%m-%d").to_string();

        let mut out = String::new();
        out.push_str("# 📋 專案週報\n\n");
        out.push_str(&format!("**專案名稱：** {}  \n", data.project.name));
        out.push_str(&format!("**專案工令：** {}  \n", data.project.code));
        out.push_str(&format!("**報告日期：** {}  \n", ymd(report.report_date)));
        out.push_str(&format!(
            "**報告週期：** {} ~ {}\n",
            ymd(report.week_start),
            ymd(report.week_end)
        ));

        out.push_str(RULE);
        out.push_str("## 📊 整體進度概況\n\n");
        out.push_str("| 指標 | 數值 | 佔比 |\n");
        out.push_str("|------|------|------|\n");
        out.push_str(&format!("| 總任務數 | {} | 100% |\n", counts.total));
        out.push_str(&format!("| 已完成 | {} | {:.1}% |\n", counts.done, counts.done_pct()));
        out.push_str(&format!("| 進行中 | {} | {:.1}% |\n", counts.going, counts.going_pct()));
        out.push_str(&format!("| 延遲中 | {} | {:.1}% |\n", counts.delay, counts.delay_pct()));
        out.push_str(&format!("\n**整體完成率：{:.1}%**\n", counts.done_pct()));

        out.push_str(RULE);
        out.push_str(&format!("## ✅ 本週完成項目 ({} 項)\n\n", report.completed_this_week.len()));
        if report.completed_this_week.is_empty() {
            out.push_str("本週無完成項目\n");
        }
        for task in &report.completed_this_week {
            out.push_str(&format!("- {} ({})\n", task.name, task.owner));
        }

        out.push_str(RULE);
        out.push_str(&format!("## 📅 下週計劃 ({} 項)\n\n", report.next_week.len()));
        if report.next_week.is_empty() {
            out.push_str("下週無預計完成項目\n");
        }
        for task in &report.next_week {
            let due = task.plan_end.map_or_else(|| "N/A".to_string(), |d| d.format("%m/%d").to_string());
            out.push_str(&format!("- {} (預計 {}, {})\n", task.name, due, task.owner));
        }

        out.push_str(RULE);
        out.push_str(&format!("## ⚠️ 風險與問題 ({} 項延遲)\n\n", report.delayed.len()));
        if report.delayed.is_empty() {
            out.push_str("目前無延遲項目 ✅\n");
        }
        for task in report.delayed_display() {
            out.push_str(&format!("- **{}** - {}\n", task.name, task.owner));
        }
        if report.delayed_hidden() > 0 {
            out.push_str(&format!("- ……另有 {} 項延遲未列出\n", report.delayed_hidden()));
        }

        out.push_str(RULE);
        out.push_str("## 📝 備註\n\n（請在此補充其他說明）\n");
        out.push_str(RULE);
        out.push_str(&format!("*{}*\n", self.footer));
        Ok(out)
    }
}
