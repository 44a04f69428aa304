//! Terminal output for the query commands
//!
//! Every command renders to a `String` so the formatting is testable without
//! spawning the binary.

use chrono::NaiveDate;
use schedboard_core::analysis::{delay_risks, owner_workload, RiskTier};
use schedboard_core::status::{search, upcoming, StatusCounts, Urgency};
use schedboard_core::{ScheduleData, Task, TaskStatus};

const RULE: &str = "═══════════════════════════════════════";
const BAR_WIDTH: usize = 30;

fn clip(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

/// `[████░░░░]` filled to `pct` percent
pub fn progress_bar(pct: f64, width: usize) -> String {
    let filled = ((pct.clamp(0.0, 100.0) / 100.0) * width as f64) as usize;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

fn risk_label(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::High => "🔴 高",
        RiskTier::Medium => "🟡 中",
        RiskTier::Low => "🟢 低",
    }
}

fn urgency_icon(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Red => "🔴",
        Urgency::Yellow => "🟡",
        Urgency::Green => "🟢",
    }
}

fn status_icon(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Done => "✅",
        TaskStatus::Going => "🔄",
        TaskStatus::Delay => "⚠️",
        TaskStatus::Unset | TaskStatus::Other(_) => "❓",
    }
}

// ============================================================================
// Commands
// ============================================================================

pub fn status(data: &ScheduleData) -> String {
    let counts = StatusCounts::from_tasks(&data.tasks);
    let title = if data.project.name.is_empty() {
        "專案".to_string()
    } else {
        data.project.name.clone()
    };

    let mut out = String::new();
    out.push_str(&format!("\n{}\n  📊 {} 狀態摘要\n{}\n\n", RULE, title, RULE));
    out.push_str(&format!("  📋 總任務數:   {}\n", counts.total));
    out.push_str(&format!("  ✅ 已完成:     {} ({:.1}%)\n", counts.done, counts.done_pct()));
    out.push_str(&format!("  🔄 進行中:     {} ({:.1}%)\n", counts.going, counts.going_pct()));
    out.push_str(&format!("  ⚠️  延遲中:     {} ({:.1}%)\n", counts.delay, counts.delay_pct()));
    out.push_str(&format!(
        "\n  進度: {} {:.1}%\n",
        progress_bar(counts.done_pct(), BAR_WIDTH),
        counts.done_pct()
    ));
    out.push_str(&format!("\n{}\n", RULE));
    out
}

pub fn delay(data: &ScheduleData) -> String {
    let risks = delay_risks(&data.tasks);
    let mut out = format!("\n⚠️  延遲項目清單 ({} 項)\n\n", risks.len());
    if risks.is_empty() {
        out.push_str("  🎉 太棒了！沒有延遲項目！\n");
        return out;
    }
    for risk in risks {
        let task = risk.task;
        out.push_str(&format!("  ● {}\n", clip(&task.name, 40)));
        out.push_str(&format!(
            "    負責: {:<15} 誤差: {:+} 天  風險: {}\n\n",
            task.owner,
            task.variance_days,
            risk_label(risk.tier)
        ));
    }
    out
}

pub fn upcoming_list(data: &ScheduleData, today: NaiveDate, days: i64) -> String {
    let found = upcoming(&data.tasks, today, days);
    let mut out = format!("\n⏰ 即將到期項目 ({} 天內, {} 項)\n\n", days, found.len());
    if found.is_empty() {
        out.push_str("  ✓ 近期沒有到期項目\n");
        return out;
    }
    for item in found {
        out.push_str(&format!("  {} {}\n", urgency_icon(item.urgency), clip(&item.task.name, 40)));
        out.push_str(&format!(
            "    負責: {:<15} 剩餘: {} 天  截止: {}\n\n",
            item.task.owner,
            item.days_left,
            item.due.format("%m/%d")
        ));
    }
    out
}

pub fn search_results(data: &ScheduleData, keyword: &str) -> String {
    let found: Vec<&Task> = search(&data.tasks, keyword);
    let mut out = format!("\n🔍 搜尋結果: '{}' ({} 項)\n\n", keyword, found.len());
    if found.is_empty() {
        out.push_str(&format!("  找不到包含 '{}' 的任務\n", keyword));
        return out;
    }
    for task in found {
        out.push_str(&format!("  {} {}\n", status_icon(&task.status), clip(&task.name, 50)));
        out.push_str(&format!("    負責: {:<15} 狀態: {}\n\n", task.owner, task.status));
    }
    out
}

pub fn owners(data: &ScheduleData) -> String {
    let mut out = String::from("\n👥 負責單位工作量統計\n\n");
    out.push_str(&format!(
        "  {:<20} {:>6} {:>6} {:>6} {:>8}\n",
        "負責單位", "總數", "完成", "待辦", "完成率"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(50)));
    for workload in owner_workload(&data.tasks) {
        out.push_str(&format!(
            "  {:<20} {:>6} {:>6} {:>6} {:>7.1}%\n",
            workload.owner,
            workload.counts.total,
            workload.counts.done,
            workload.pending(),
            workload.completion_rate()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn data() -> ScheduleData {
        let mut data = ScheduleData::default();
        data.project.name = "Fab 3 AMHS".into();
        data.tasks = vec![
            Task::new("Rail install").owner("Mech").with_status(TaskStatus::Done),
            Task::new("Vehicle teaching")
                .owner("SW")
                .with_status(TaskStatus::Going)
                .plan(Some(date(2026, 5, 1)), Some(date(2026, 5, 12))),
            Task::new("Stocker interlock")
                .owner("SW")
                .with_status(TaskStatus::Delay)
                .variance(-9),
            Task::new("MCS link").owner("IT").with_status(TaskStatus::Going),
        ];
        data.renumber();
        data
    }

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(progress_bar(50.0, 4), "[██░░]");
        assert_eq!(progress_bar(0.0, 3), "[░░░]");
        assert_eq!(progress_bar(140.0, 2), "[██]");
    }

    #[test]
    fn status_shows_counts_and_rates() {
        let text = status(&data());
        assert!(text.contains("📊 Fab 3 AMHS 狀態摘要"));
        assert!(text.contains("📋 總任務數:   4"));
        assert!(text.contains("✅ 已完成:     1 (25.0%)"));
        assert!(text.contains("🔄 進行中:     2 (50.0%)"));
    }

    #[test]
    fn status_of_empty_table_has_no_division_by_zero() {
        let text = status(&ScheduleData::default());
        assert!(text.contains("0 (0.0%)"));
        assert!(text.contains("0.0%"));
    }

    #[test]
    fn delay_lines_carry_variance_and_risk() {
        let text = delay(&data());
        assert!(text.contains("(1 項)"));
        assert!(text.contains("● Stocker interlock"));
        assert!(text.contains("誤差: -9 天  風險: 🔴 高"));
    }

    #[test]
    fn no_delays_is_celebrated() {
        let mut data = data();
        data.tasks.retain(|t| t.status != TaskStatus::Delay);
        assert!(delay(&data).contains("沒有延遲項目"));
    }

    #[test]
    fn upcoming_lists_due_going_tasks() {
        let text = upcoming_list(&data(), date(2026, 5, 10), 7);
        assert!(text.contains("(7 天內, 1 項)"));
        assert!(text.contains("🔴 Vehicle teaching"));
        assert!(text.contains("剩餘: 2 天  截止: 05/12"));

        let text = upcoming_list(&data(), date(2026, 5, 13), 7);
        assert!(text.contains("近期沒有到期項目"));
    }

    #[test]
    fn search_is_case_insensitive() {
        let text = search_results(&data(), "RAIL");
        assert!(text.contains("(1 項)"));
        assert!(text.contains("✅ Rail install"));
        assert!(text.contains("狀態: Done"));
        assert!(search_results(&data(), "crane").contains("找不到包含 'crane' 的任務"));
    }

    #[test]
    fn owners_sorted_by_total() {
        let text = owners(&data());
        let sw = text.find("  SW ").unwrap();
        let mech = text.find("  Mech ").unwrap();
        assert!(sw < mech);
        assert!(text.contains("0.0%"));
        assert!(text.contains("100.0%"));
    }
}
