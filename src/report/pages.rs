//! Terminal dashboard pages
//!
//! Every page renders KPI cards and comfy-table tables from one analysis
//! result. A page whose analysis failed prints the reason and reports
//! failure; the caller moves on to the next page.

use std::fmt;
use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;
use serde::Serialize;

use crate::pipeline::customers::CustomerReport;
use crate::pipeline::error::DataResult;
use crate::pipeline::forecast::ForecastReport;
use crate::pipeline::market::MarketReport;
use crate::pipeline::overview::OverviewReport;
use crate::pipeline::payments::PaymentReport;
use crate::pipeline::rfm::FrequencyBasis;
use crate::pipeline::seasonal::{month_name, SeasonalReport};
use crate::pipeline::AnalysisResults;
use crate::utils::{print_info, print_page_header, print_section, print_warning};

const BAR_WIDTH: usize = 40;
const TABLE_ROWS: usize = 10;
/// Correlations stronger than this are called out below the matrix
const NOTABLE_CORRELATION: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Overview,
    Customers,
    Seasonal,
    Market,
    Payments,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Overview,
        Page::Customers,
        Page::Seasonal,
        Page::Market,
        Page::Payments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Page::Overview => "overview",
            Page::Customers => "customers",
            Page::Seasonal => "seasonal",
            Page::Market => "market",
            Page::Payments => "payments",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Overview => "Business Overview",
            Page::Customers => "Customer Analytics",
            Page::Seasonal => "Seasonal Intelligence",
            Page::Market => "Market Expansion",
            Page::Payments => "Payment Operations",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Page {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overview" => Ok(Page::Overview),
            "customers" | "customer" => Ok(Page::Customers),
            "seasonal" | "seasonality" => Ok(Page::Seasonal),
            "market" | "expansion" => Ok(Page::Market),
            "payments" | "payment" => Ok(Page::Payments),
            _ => Err(format!(
                "Invalid page: '{}'. Use one of: overview, customers, seasonal, market, payments, all",
                s.trim()
            )),
        }
    }
}

/// Parse a comma separated page list; `all` selects every page. Duplicates
/// are dropped, order is kept.
pub fn parse_pages(s: &str) -> Result<Vec<Page>, String> {
    let mut pages = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.eq_ignore_ascii_case("all") {
            return Ok(Page::ALL.to_vec());
        }
        let page: Page = part.parse()?;
        if !pages.contains(&page) {
            pages.push(page);
        }
    }
    if pages.is_empty() {
        return Err("At least one page must be selected".to_string());
    }
    Ok(pages)
}

// Formatting helpers

/// Brazilian real with thousands separators, e.g. `R$ 1,234.56`
pub fn format_money(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}R$ {}.{:02}", if negative { "-" } else { "" }, grouped, cents % 100)
}

fn format_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.*}", decimals, v))
}

fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v))
}

/// One bar per row, scaled to the largest value
pub fn bar_chart_lines(rows: &[(String, f64)], width: usize) -> Vec<String> {
    let max = rows.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let label_width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(label, value)| {
            let len = if max > 0.0 {
                ((value.max(0.0) / max) * width as f64).round() as usize
            } else {
                0
            };
            format!(
                "{:<lw$} │{:<w$}│ {}",
                label,
                "█".repeat(len),
                format_money(*value),
                lw = label_width,
                w = width
            )
        })
        .collect()
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn right(text: impl fmt::Display) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn print_table(table: &Table) {
    // Indent the table
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn print_kpi_cards(cards: &[(&str, String)]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.add_row(
        cards
            .iter()
            .map(|(label, _)| Cell::new(label).fg(Color::DarkGrey))
            .collect::<Vec<_>>(),
    );
    table.add_row(
        cards
            .iter()
            .map(|(_, value)| Cell::new(value).fg(Color::Cyan).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    print_table(&table);
}

fn print_bar_chart(rows: &[(String, f64)]) {
    for line in bar_chart_lines(rows, BAR_WIDTH) {
        println!("    {}", style(line).cyan());
    }
}

/// Render the page if its analysis succeeded; returns whether it did
pub fn render_page(page: Page, results: &AnalysisResults) -> bool {
    print_page_header(page.title());
    match page {
        Page::Overview => show(&results.overview, render_overview),
        Page::Customers => show(&results.customers, render_customers),
        Page::Seasonal => show(&results.seasonal, |report| {
            render_seasonal(report);
            render_forecast(&results.forecast);
        }),
        Page::Market => show(&results.market, render_market),
        Page::Payments => show(&results.payments, render_payments),
    }
}

fn show<T>(result: &DataResult<T>, render: impl FnOnce(&T)) -> bool {
    match result {
        Ok(report) => {
            render(report);
            true
        }
        Err(err) => {
            print_warning(&format!("Page unavailable: {}", err));
            false
        }
    }
}

fn render_overview(report: &OverviewReport) {
    let k = &report.kpis;
    print_kpi_cards(&[
        ("Revenue", format_money(k.total_revenue)),
        ("Orders", k.total_orders.to_string()),
        ("Customers", k.total_customers.to_string()),
        ("Avg order", format_money(k.avg_order_value)),
        ("Avg review", format_opt(k.avg_review_score, 2)),
        ("On time", format_pct(k.on_time_pct)),
    ]);
    print_info(&format!(
        "Purchases from {} to {}, {:.1}% delivered, {} days average delivery",
        k.first_purchase,
        k.last_purchase,
        k.delivered_pct,
        format_opt(k.avg_delivery_days, 1)
    ));

    for (title, rows) in [
        ("Top States by Revenue", &report.top_states),
        ("Top Categories by Revenue", &report.top_categories),
    ] {
        if rows.is_empty() {
            continue;
        }
        print_section(title);
        let mut table = new_table(&["Name", "Orders", "Revenue", "Share"]);
        for row in rows {
            table.add_row(vec![
                Cell::new(&row.name),
                right(row.orders),
                right(format_money(row.revenue)),
                right(format!("{:.1}%", row.share_pct)),
            ]);
        }
        print_table(&table);
    }

    print_section("Monthly Revenue Trend");
    let trend: Vec<(String, f64)> = report
        .monthly_trend
        .iter()
        .map(|p| (format!("{}-{:02}", p.year, p.month), p.revenue))
        .collect();
    print_bar_chart(&trend);
}

fn render_customers(report: &CustomerReport) {
    print_kpi_cards(&[
        ("Customers", report.total_customers.to_string()),
        ("Revenue", format_money(report.total_revenue)),
        ("Avg CLV", format_money(report.avg_clv)),
        ("Repeat", report.repeat_customers.to_string()),
        ("Active", report.active_customers.to_string()),
        ("Churned", report.churned_customers.to_string()),
    ]);
    if report.frequency_basis == FrequencyBasis::DeliverySpeed {
        print_info("Order counts do not vary, so RFM frequency is scored on delivery speed");
    }

    print_section("RFM Segments");
    let mut table = new_table(&["Segment", "Customers", "Share", "Revenue", "Avg Revenue", "Avg Recency", "R/F/M"]);
    for s in &report.segments {
        table.add_row(vec![
            Cell::new(s.segment.label()),
            right(s.customers),
            right(format!("{:.1}%", s.share_pct)),
            right(format_money(s.total_revenue)),
            right(format_money(s.avg_revenue)),
            right(format!("{:.0}d", s.avg_recency_days)),
            right(format!(
                "{:.1}/{:.1}/{:.1}",
                s.avg_recency_score, s.avg_frequency_score, s.avg_monetary_score
            )),
        ]);
    }
    print_table(&table);

    print_section("Customer Lifetime Value");
    let mut table = new_table(&["CLV Category", "Customers", "Avg CLV", "Total CLV", "Avg Delivery", "Reliability"]);
    for g in &report.clv_by_category {
        table.add_row(vec![
            Cell::new(&g.label),
            right(g.customers),
            right(format_money(g.avg_clv)),
            right(format_money(g.total_clv)),
            right(format_opt(g.avg_delivery_days, 1)),
            right(format_pct(g.avg_reliability.map(|r| r * 100.0))),
        ]);
    }
    print_table(&table);

    print_section("Delivery Experience");
    let d = &report.delivery_impact;
    let mut table = new_table(&["Speed", "Customers", "Avg Revenue", "Reliability", "Avg Review"]);
    for row in &d.by_speed {
        table.add_row(vec![
            Cell::new(row.speed.label()),
            right(row.customers),
            right(format_money(row.avg_revenue)),
            right(format_pct(row.avg_reliability.map(|r| r * 100.0))),
            right(format_opt(row.avg_review_score, 2)),
        ]);
    }
    print_table(&table);
    print_info(&format!(
        "Always on time: {} customers averaging {}; otherwise: {} averaging {}",
        d.reliable_customers,
        format_money(d.reliable_avg_revenue),
        d.unreliable_customers,
        format_money(d.unreliable_avg_revenue)
    ));

    print_section("High-Value Customer Model");
    match &report.high_value_model {
        Ok(model) => {
            print_info(&format!(
                "Accuracy {:.1}%, precision {:.1}%, recall {:.1}% on {} held-out customers",
                model.accuracy * 100.0,
                model.precision * 100.0,
                model.recall * 100.0,
                model.test_rows
            ));
            let mut table = new_table(&["Feature", "Importance"]);
            for (name, importance) in model.feature_importances.iter().take(5) {
                table.add_row(vec![Cell::new(name), right(format!("{:.3}", importance))]);
            }
            print_table(&table);
        }
        Err(reason) => print_warning(&format!("Model unavailable: {}", reason)),
    }
}

fn render_seasonal(report: &SeasonalReport) {
    let v = &report.variation;
    let impact = &report.holiday_impact;
    print_kpi_cards(&[
        ("Revenue", format_money(report.total_revenue)),
        ("Revenue CV", format!("{:.3}", v.revenue_cv)),
        ("Orders CV", format!("{:.3}", v.orders_cv)),
        ("Peak month", month_name(v.peak_revenue_month).to_string()),
        ("Trough month", month_name(v.trough_revenue_month).to_string()),
    ]);

    print_section("Revenue by Calendar Month");
    let rows: Vec<(String, f64)> = report
        .buckets
        .iter()
        .map(|b| (b.month_name.to_string(), b.revenue))
        .collect();
    print_bar_chart(&rows);

    print_section("Holiday Impact (vs monthly average)");
    if impact.uneven_coverage {
        print_warning("Months are covered by different numbers of years; deltas are skewed");
    }
    let mut table = new_table(&["Month", "Event", "Expected", "Revenue", "Δ Revenue", "Δ Orders", "Years"]);
    for m in &impact.months {
        let delta_color = if m.revenue_vs_average_pct >= 0.0 {
            Color::Green
        } else {
            Color::Red
        };
        table.add_row(vec![
            Cell::new(month_name(m.month)),
            Cell::new(m.event),
            Cell::new(m.expected_impact.label()),
            right(format_money(m.revenue)),
            right(format!("{:+.1}%", m.revenue_vs_average_pct)).fg(delta_color),
            right(format!("{:+.1}%", m.orders_vs_average_pct)),
            right(m.years_covered),
        ]);
    }
    print_table(&table);

    print_section("Seasons");
    let mut table = new_table(&["Season", "Revenue", "Orders", "Share"]);
    for s in &report.seasons {
        table.add_row(vec![
            Cell::new(format!("{:?}", s.season)),
            right(format_money(s.revenue)),
            right(s.orders),
            right(format!("{:.1}%", s.revenue_share_pct)),
        ]);
    }
    print_table(&table);

    if !report.categories.is_empty() {
        print_section("Most Seasonal Categories");
        let mut table = new_table(&["Category", "Revenue", "CV", "Level", "Peak", "Peak/Trough"]);
        for c in report.categories.iter().take(TABLE_ROWS) {
            table.add_row(vec![
                Cell::new(&c.category),
                right(format_money(c.total_revenue)),
                right(format!("{:.2}", c.cv)),
                Cell::new(format!("{:?}", c.level)),
                Cell::new(month_name(c.peak_month)),
                right(format_opt(c.peak_to_trough, 1)),
            ]);
        }
        print_table(&table);
    }
}

fn render_forecast(forecast: &DataResult<ForecastReport>) {
    print_section("Demand Forecast");
    let report = match forecast {
        Ok(report) => report,
        Err(err) => {
            print_warning(&format!("Forecast unavailable: {}", err));
            return;
        }
    };
    let mut table = new_table(&["Month", "Revenue", "95% interval", "Orders", "95% interval"]);
    for p in &report.forecast {
        table.add_row(vec![
            Cell::new(format!("{} {}", p.month_name, p.year)),
            right(format_money(p.revenue)),
            right(format!(
                "{} – {}",
                format_money(p.revenue_lower),
                format_money(p.revenue_upper)
            )),
            right(format!("{:.0}", p.orders)),
            right(format!("{:.0} – {:.0}", p.orders_lower, p.orders_upper)),
        ]);
    }
    print_table(&table);
    for model in [&report.revenue_model, &report.orders_model] {
        match &model.metrics {
            Some(m) => print_info(&format!(
                "{} model: MAE {:.2}, RMSE {:.2}, R² {:.3} ({} train / {} test months)",
                model.target, m.mae, m.rmse, m.r2, model.train_rows, model.test_rows
            )),
            None => print_info(&format!("{} model: no hold-out months", model.target)),
        }
    }
}

fn render_market(report: &MarketReport) {
    let top = report.opportunities.first();
    print_kpi_cards(&[
        ("States", report.states_analyzed.to_string()),
        ("Untapped revenue", format_money(report.total_untapped_revenue)),
        ("Seller gap", report.total_seller_gap.to_string()),
        ("Shortage states", report.shortage_states.len().to_string()),
        ("Top state", top.map_or_else(|| "n/a".to_string(), |o| o.metrics.state.clone())),
    ]);
    if !report.unknown_states.is_empty() {
        print_warning(&format!(
            "No reference data for: {}",
            report.unknown_states.join(", ")
        ));
    }

    print_section("Expansion Opportunities");
    let mut table = new_table(&[
        "#", "State", "Tier", "Customers", "Sellers", "Revenue", "Penetration", "Score", "Priority",
    ]);
    for (rank, o) in report.opportunities.iter().enumerate() {
        let score_color = if o.opportunity_score >= 0.6 {
            Color::Green
        } else if o.opportunity_score >= 0.4 {
            Color::Yellow
        } else {
            Color::White
        };
        table.add_row(vec![
            right(rank + 1),
            Cell::new(&o.metrics.state).add_attribute(Attribute::Bold),
            right(o.tier.map_or_else(|| "?".to_string(), |t| t.to_string())),
            right(o.metrics.customers),
            right(o.metrics.sellers),
            right(format_money(o.metrics.revenue)),
            right(format!("{:.3}", o.penetration_rate)),
            right(format!("{:.3}", o.opportunity_score)).fg(score_color),
            Cell::new(o.priority.label()),
        ]);
    }
    print_table(&table);

    print_section("Priorities");
    for p in &report.priorities {
        println!(
            "      {} {:<24} {}",
            style("•").dim(),
            p.priority.label(),
            style(p.states).yellow().bold()
        );
    }

    print_section("Score Components (top states)");
    let mut table = new_table(&["State", "Size", "Growth", "Operational", "Competitive", "Untapped Revenue"]);
    for o in report.opportunities.iter().take(TABLE_ROWS) {
        table.add_row(vec![
            Cell::new(&o.metrics.state),
            right(format!("{:.3}", o.market_size_score)),
            right(format!("{:.3}", o.growth_score)),
            right(format!("{:.3}", o.operational_score)),
            right(format!("{:.3}", o.competitive_score)),
            right(format_money(o.untapped_revenue)),
        ]);
    }
    print_table(&table);
}

fn render_payments(report: &PaymentReport) {
    let ops = &report.operations;
    print_kpi_cards(&[
        ("Payments", report.total_payments.to_string()),
        ("Value", format_money(report.total_value)),
        ("Delivered", format!("{:.1}%", ops.delivery_rate_pct)),
        ("On time", format_pct(ops.on_time_rate_pct)),
        ("Avg delivery", format!("{} d", format_opt(ops.avg_delivery_days, 1))),
    ]);

    print_section("Payment Methods");
    let mut table = new_table(&["Method", "Payments", "Share", "Avg Installments", "Avg Value"]);
    for m in &report.methods {
        let stats = report
            .installments
            .iter()
            .find(|s| s.payment_type == m.payment_type);
        table.add_row(vec![
            Cell::new(&m.payment_type),
            right(m.payments),
            right(format!("{:.1}%", m.share_pct)),
            right(format_opt(stats.map(|s| s.avg_installments), 2)),
            right(stats.and_then(|s| s.avg_value).map_or_else(|| "n/a".to_string(), format_money)),
        ]);
    }
    print_table(&table);

    print_section("Installments vs Satisfaction");
    let mut table = new_table(&["Plan", "Reviews", "Avg Review", "Avg Value", "Avg Delivery", "On Time"]);
    for s in &report.satisfaction_by_installments {
        table.add_row(vec![
            Cell::new(&s.group),
            right(s.reviews),
            right(format!("{:.2}", s.avg_review)),
            right(s.avg_value.map_or_else(|| "n/a".to_string(), format_money)),
            right(format_opt(s.avg_delivery_days, 1)),
            right(format_pct(s.on_time_rate_pct)),
        ]);
    }
    print_table(&table);

    if let Some(corr) = &report.correlations {
        print_section(&format!("Correlations ({} payments)", corr.rows));
        let mut headers = vec![""];
        headers.extend(corr.names.iter().map(String::as_str));
        let mut table = new_table(&headers);
        for (name, row) in corr.names.iter().zip(&corr.values) {
            let mut cells = vec![Cell::new(name)];
            cells.extend(row.iter().map(|v| right(format_opt(*v, 3))));
            table.add_row(cells);
        }
        print_table(&table);
        for pair in corr.pairs_above(NOTABLE_CORRELATION) {
            print_info(&format!(
                "{} and {}: r = {:.3}",
                pair.feature1, pair.feature2, pair.correlation
            ));
        }
    }

    print_section("Delivery Performance by State");
    let mut table = new_table(&["State", "Orders", "On Time", "Avg Delivery", "Avg Review", "Avg Order"]);
    for s in report.state_performance.iter().take(TABLE_ROWS) {
        table.add_row(vec![
            Cell::new(&s.state),
            right(s.orders),
            right(format_pct(s.on_time_rate_pct)),
            right(format_opt(s.avg_delivery_days, 1)),
            right(format_opt(s.avg_review, 2)),
            right(format_money(s.avg_order_value)),
        ]);
    }
    print_table(&table);

    if !report.delay_impact.is_empty() {
        print_section("Delivery Accuracy vs Review");
        let mut table = new_table(&["Accuracy", "Orders", "Avg Review"]);
        for d in &report.delay_impact {
            table.add_row(vec![
                Cell::new(d.accuracy.label()),
                right(d.orders),
                right(format_opt(d.avg_review, 2)),
            ]);
        }
        print_table(&table);
    }

    if !report.regional_satisfaction.is_empty() {
        print_info(&format!(
            "{} state/method combinations have enough reviews for regional comparison",
            report.regional_satisfaction.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pages() {
        assert_eq!(parse_pages("all").unwrap(), Page::ALL.to_vec());
        assert_eq!(
            parse_pages("market, overview,market").unwrap(),
            vec![Page::Market, Page::Overview]
        );
        assert!(parse_pages("sales").is_err());
        assert!(parse_pages(" , ").is_err());
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "R$ 0.00");
        assert_eq!(format_money(1234.5), "R$ 1,234.50");
        assert_eq!(format_money(1_000_000.0), "R$ 1,000,000.00");
        assert_eq!(format_money(-12.345), "-R$ 12.35");
    }

    #[test]
    fn test_bar_chart_scales_to_max() {
        let rows = vec![("Jan".to_string(), 50.0), ("Feb".to_string(), 100.0)];
        let lines = bar_chart_lines(&rows, 10);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches('█').count(), 5);
        assert_eq!(lines[1].matches('█').count(), 10);
    }
}
