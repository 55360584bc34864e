use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_utils::AppState;
use staff_cell::services::SalaryService;

use crate::models::{
    DailyReport, DoctorEarning, FinanceError, MonthlyReport, ReportVisit, VisitTotals,
};
use crate::services::expenses::ExpenseService;

const REPORT_VISIT_COLUMNS: &str = "select=doctor_id,total,discount_amount,doctor_earning&status=eq.completed";

pub struct ReportService {
    db: Arc<SupabaseClient>,
}

impl ReportService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub fn from_client(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn daily_report(&self, clinic_id: Uuid, date: NaiveDate) -> Result<DailyReport, FinanceError> {
        let patients_count = self.patients_created(clinic_id, date, date).await?;

        let visits: Vec<ReportVisit> = self
            .db
            .select(
                "visits",
                &format!("{}&clinic_id=eq.{}&date=eq.{}", REPORT_VISIT_COLUMNS, clinic_id, date),
            )
            .await?;

        let totals = self.with_doctor_names(fold_visits(visits)).await;
        info!(%clinic_id, %date, visits = totals.visits_count, "Daily report built");

        Ok(DailyReport {
            date,
            patients_count,
            visits_count: totals.visits_count,
            total_revenue: totals.total_revenue,
            total_discount: totals.total_discount,
            doctor_earnings: totals.doctor_earnings,
        })
    }

    /// A visit belongs to the month its `date` falls in, the same column the daily report uses.
    #[instrument(skip(self))]
    pub async fn monthly_report(&self, clinic_id: Uuid, year: i32, month: u32) -> Result<MonthlyReport, FinanceError> {
        let (first, last) = month_bounds(year, month)?;

        let patients_count = self.patients_created(clinic_id, first, last).await?;
        let visits: Vec<ReportVisit> = self
            .db
            .select(
                "visits",
                &format!(
                    "{}&clinic_id=eq.{}&date=gte.{}&date=lte.{}",
                    REPORT_VISIT_COLUMNS, clinic_id, first, last
                ),
            )
            .await?;
        let totals = self.with_doctor_names(fold_visits(visits)).await;

        let expenses = ExpenseService::from_client(self.db.clone())
            .expenses_between(clinic_id, first, last)
            .await?;
        let mut expenses_by_category = BTreeMap::new();
        for expense in &expenses {
            *expenses_by_category.entry(expense.category).or_insert(0.0) += expense.amount;
        }
        for amount in expenses_by_category.values_mut() {
            *amount = round2(*amount);
        }
        let total_expenses = round2(expenses.iter().map(|e| e.amount).sum());

        let salaries = SalaryService::from_client(self.db.clone())
            .active_salaries(clinic_id)
            .await?;
        let total_salaries = round2(salaries.iter().map(|s| s.monthly_amount).sum());

        let gross_profit = round2(totals.total_revenue - totals.total_doctor_earnings);
        let net_profit = round2(gross_profit - total_expenses - total_salaries);

        info!(%clinic_id, year, month, visits = totals.visits_count, net_profit, "Monthly report built");

        Ok(MonthlyReport {
            year,
            month,
            patients_count,
            visits_count: totals.visits_count,
            total_revenue: totals.total_revenue,
            total_discount: totals.total_discount,
            doctor_earnings: totals.doctor_earnings,
            total_expenses,
            expenses_by_category,
            total_salaries,
            total_doctor_earnings: totals.total_doctor_earnings,
            gross_profit,
            net_profit,
        })
    }

    /// Patients whose `created_at` falls on any day in `first..=last` (UTC).
    async fn patients_created(&self, clinic_id: Uuid, first: NaiveDate, last: NaiveDate) -> Result<u64, FinanceError> {
        let end = last + Duration::days(1);
        Ok(self
            .db
            .count(
                "patients",
                &format!(
                    "clinic_id=eq.{}&created_at=gte.{}T00:00:00Z&created_at=lt.{}T00:00:00Z",
                    clinic_id, first, end
                ),
            )
            .await?)
    }

    async fn with_doctor_names(&self, mut totals: VisitTotals) -> VisitTotals {
        if totals.doctor_earnings.is_empty() {
            return totals;
        }

        let ids = totals
            .doctor_earnings
            .iter()
            .map(|row| row.doctor_id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let names: HashMap<Uuid, String> = match self
            .db
            .select::<DoctorName>("users", &format!("select=id,first_name,last_name&id=in.({})", ids))
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|row| (row.id, format!("{} {}", row.first_name, row.last_name)))
                .collect(),
            Err(e) => {
                warn!("Could not resolve doctor names for report: {}", e);
                HashMap::new()
            }
        };

        for row in &mut totals.doctor_earnings {
            row.doctor_name = names.get(&row.doctor_id).cloned().unwrap_or_default();
        }
        totals
    }
}

#[derive(Debug, Deserialize)]
struct DoctorName {
    id: Uuid,
    first_name: String,
    last_name: String,
}

/// Sums completed visits and groups them per doctor, highest revenue first.
pub fn fold_visits(visits: Vec<ReportVisit>) -> VisitTotals {
    let mut totals = VisitTotals {
        visits_count: visits.len(),
        ..VisitTotals::default()
    };
    let mut per_doctor: HashMap<Uuid, DoctorEarning> = HashMap::new();

    for visit in visits {
        totals.total_revenue += visit.total;
        totals.total_discount += visit.discount_amount;
        totals.total_doctor_earnings += visit.doctor_earning;

        let row = per_doctor.entry(visit.doctor_id).or_insert_with(|| DoctorEarning {
            doctor_id: visit.doctor_id,
            doctor_name: String::new(),
            revenue: 0.0,
            earning: 0.0,
            visit_count: 0,
        });
        row.revenue += visit.total;
        row.earning += visit.doctor_earning;
        row.visit_count += 1;
    }

    totals.total_revenue = round2(totals.total_revenue);
    totals.total_discount = round2(totals.total_discount);
    totals.total_doctor_earnings = round2(totals.total_doctor_earnings);

    let mut rows: Vec<DoctorEarning> = per_doctor
        .into_values()
        .map(|mut row| {
            row.revenue = round2(row.revenue);
            row.earning = round2(row.earning);
            row
        })
        .collect();
    rows.sort_by(|a, b| {
        b.revenue
            .total_cmp(&a.revenue)
            .then_with(|| a.doctor_id.cmp(&b.doctor_id))
    });
    totals.doctor_earnings = rows;
    totals
}

/// First and last calendar day of a month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), FinanceError> {
    if !(1..=12).contains(&month) {
        return Err(FinanceError::InvalidMonth);
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(FinanceError::InvalidMonth)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or(FinanceError::InvalidMonth)?;

    Ok((first, next - Duration::days(1)))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn visit(doctor_id: Uuid, total: f64, discount: f64, earning: f64) -> ReportVisit {
        ReportVisit {
            doctor_id,
            total,
            discount_amount: discount,
            doctor_earning: earning,
        }
    }

    #[test]
    fn no_visits_gives_zero_totals() {
        let totals = fold_visits(Vec::new());
        assert_eq!(totals, VisitTotals::default());
        assert!(totals.doctor_earnings.is_empty());
    }

    #[test]
    fn visits_are_grouped_per_doctor_by_revenue() {
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();

        let totals = fold_visits(vec![
            visit(low, 100.0, 0.0, 40.0),
            visit(high, 225.0, 25.0, 90.0),
            visit(high, 75.5, 0.0, 30.2),
        ]);

        assert_eq!(totals.visits_count, 3);
        assert_eq!(totals.total_revenue, 400.5);
        assert_eq!(totals.total_discount, 25.0);
        assert_eq!(totals.total_doctor_earnings, 160.2);

        assert_eq!(totals.doctor_earnings.len(), 2);
        assert_eq!(totals.doctor_earnings[0].doctor_id, high);
        assert_eq!(totals.doctor_earnings[0].revenue, 300.5);
        assert_eq!(totals.doctor_earnings[0].earning, 120.2);
        assert_eq!(totals.doctor_earnings[0].visit_count, 2);
        assert_eq!(totals.doctor_earnings[1].doctor_id, low);
    }

    #[test]
    fn equal_revenue_is_ordered_by_doctor_id() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);

        let totals = fold_visits(vec![visit(b, 50.0, 0.0, 10.0), visit(a, 50.0, 0.0, 10.0)]);

        assert_eq!(totals.doctor_earnings[0].doctor_id, a);
        assert_eq!(totals.doctor_earnings[1].doctor_id, b);
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2025, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn month_outside_calendar_is_rejected() {
        assert_matches!(month_bounds(2025, 0), Err(FinanceError::InvalidMonth));
        assert_matches!(month_bounds(2025, 13), Err(FinanceError::InvalidMonth));
    }
}
