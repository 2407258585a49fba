//! Dashboard aggregations.
//!
//! Pure functions over slices of procurement records. No I/O, no clock:
//! "today" is passed in so results are deterministic.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{HasStatus, Invoice, PurchaseOrder, Shipment, Tender, Vendor};
use crate::service::parse_date_bound;

const CANCELLED: &str = "cancelled";

/// Inputs to [`summarize`].
#[derive(Debug, Clone, Default)]
pub struct DashboardInput {
    pub purchase_orders: Vec<PurchaseOrder>,
    pub vendors: Vec<Vendor>,
    pub tenders: Vec<Tender>,
    pub shipments: Vec<Shipment>,
    pub invoices: Vec<Invoice>,
}

/// Headline numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_spend: f64,
    pub purchase_order_count: usize,
    pub average_order_value: f64,
    pub vendor_count: usize,
    pub active_vendors: usize,
    pub open_tenders: usize,
    pub tender_pipeline_value: f64,
    pub in_transit_shipments: usize,
    pub pending_invoices: usize,
    pub overdue_invoices: usize,
    pub outstanding_amount: f64,
}

/// Spend attributed to one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendBucket {
    pub period: String,
    pub amount: f64,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSpend {
    pub vendor_id: String,
    pub vendor_name: Option<String>,
    pub amount: f64,
    pub orders: usize,
}

/// Everything the dashboard endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub summary: DashboardSummary,
    pub purchase_orders_by_status: BTreeMap<String, usize>,
    pub tenders_by_status: BTreeMap<String, usize>,
    pub shipments_by_status: BTreeMap<String, usize>,
    pub invoices_by_status: BTreeMap<String, usize>,
    pub monthly_spend: Vec<SpendBucket>,
    pub quarterly_spend: Vec<SpendBucket>,
    pub top_vendors: Vec<VendorSpend>,
}

fn counts_toward_spend(order: &PurchaseOrder) -> bool {
    !order.status.eq_ignore_ascii_case(CANCELLED)
}

fn is_settled(invoice: &Invoice) -> bool {
    matches!(invoice.status.as_str(), "paid" | "cancelled")
}

/// Count items per status.
pub fn count_by_status<T: HasStatus>(items: &[T]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for item in items {
        *counts.entry(item.status().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Sum of non-cancelled purchase order amounts.
pub fn total_spend(orders: &[PurchaseOrder]) -> f64 {
    orders
        .iter()
        .filter(|o| counts_toward_spend(o))
        .map(|o| o.total_amount)
        .sum()
}

/// Invoices that are neither paid nor cancelled and are due before `today`.
pub fn overdue_invoices<'a>(invoices: &'a [Invoice], today: NaiveDate) -> Vec<&'a Invoice> {
    invoices
        .iter()
        .filter(|i| !is_settled(i))
        .filter(|i| {
            i.status == "overdue"
                || i.due_date
                    .as_deref()
                    .and_then(|d| parse_date_bound(d, false))
                    .is_some_and(|due| due.date_naive() < today)
        })
        .collect()
}

fn bucket_spend(
    orders: &[PurchaseOrder],
    period_of: impl Fn(NaiveDate) -> String,
) -> Vec<SpendBucket> {
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for order in orders.iter().filter(|o| counts_toward_spend(o)) {
        let Some(date) = order
            .spend_date()
            .and_then(|d| parse_date_bound(d, false))
            .map(|ts| ts.date_naive())
        else {
            continue;
        };
        let entry = buckets.entry(period_of(date)).or_insert((0.0, 0));
        entry.0 += order.total_amount;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(period, (amount, orders))| SpendBucket {
            period,
            amount,
            orders,
        })
        .collect()
}

/// Spend per `YYYY-MM`, ascending. Orders without a parseable date are skipped.
pub fn monthly_spend(orders: &[PurchaseOrder]) -> Vec<SpendBucket> {
    bucket_spend(orders, |d| format!("{:04}-{:02}", d.year(), d.month()))
}

/// Spend per `YYYY-Qn`, ascending.
pub fn quarterly_spend(orders: &[PurchaseOrder]) -> Vec<SpendBucket> {
    bucket_spend(orders, |d| format!("{:04}-Q{}", d.year(), d.month0() / 3 + 1))
}

/// The `n` vendors with the highest spend, ties broken by vendor id.
pub fn top_vendors_by_spend(
    orders: &[PurchaseOrder],
    vendors: &[Vendor],
    n: usize,
) -> Vec<VendorSpend> {
    let names: HashMap<&str, &str> = vendors
        .iter()
        .map(|v| (v.id.as_str(), v.name.as_str()))
        .collect();

    let mut per_vendor: HashMap<&str, (f64, usize)> = HashMap::new();
    for order in orders.iter().filter(|o| counts_toward_spend(o)) {
        let Some(vendor_id) = order.vendor_id.as_deref() else {
            continue;
        };
        let entry = per_vendor.entry(vendor_id).or_insert((0.0, 0));
        entry.0 += order.total_amount;
        entry.1 += 1;
    }

    let mut ranked: Vec<VendorSpend> = per_vendor
        .into_iter()
        .map(|(vendor_id, (amount, orders))| VendorSpend {
            vendor_id: vendor_id.to_string(),
            vendor_name: names
                .get(vendor_id)
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string()),
            amount,
            orders,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.vendor_id.cmp(&b.vendor_id))
    });
    ranked.truncate(n);
    ranked
}

pub fn summarize(input: &DashboardInput, today: NaiveDate) -> DashboardSummary {
    let spend_orders = input
        .purchase_orders
        .iter()
        .filter(|o| counts_toward_spend(o))
        .count();
    let total_spend = total_spend(&input.purchase_orders);

    let open_tenders: Vec<&Tender> = input
        .tenders
        .iter()
        .filter(|t| matches!(t.status.as_str(), "published" | "evaluation"))
        .collect();

    DashboardSummary {
        total_spend,
        purchase_order_count: input.purchase_orders.len(),
        average_order_value: if spend_orders == 0 {
            0.0
        } else {
            total_spend / spend_orders as f64
        },
        vendor_count: input.vendors.len(),
        active_vendors: input
            .vendors
            .iter()
            .filter(|v| v.status == "active")
            .count(),
        open_tenders: open_tenders.len(),
        tender_pipeline_value: open_tenders.iter().map(|t| t.estimated_value).sum(),
        in_transit_shipments: input
            .shipments
            .iter()
            .filter(|s| s.status == "in_transit")
            .count(),
        pending_invoices: input
            .invoices
            .iter()
            .filter(|i| matches!(i.status.as_str(), "pending" | "approved"))
            .count(),
        overdue_invoices: overdue_invoices(&input.invoices, today).len(),
        outstanding_amount: input
            .invoices
            .iter()
            .filter(|i| !is_settled(i))
            .map(|i| i.amount)
            .sum(),
    }
}

/// All dashboard figures at once.
pub fn dashboard_stats(input: &DashboardInput, today: NaiveDate) -> DashboardStats {
    DashboardStats {
        summary: summarize(input, today),
        purchase_orders_by_status: count_by_status(&input.purchase_orders),
        tenders_by_status: count_by_status(&input.tenders),
        shipments_by_status: count_by_status(&input.shipments),
        invoices_by_status: count_by_status(&input.invoices),
        monthly_spend: monthly_spend(&input.purchase_orders),
        quarterly_spend: quarterly_spend(&input.purchase_orders),
        top_vendors: top_vendors_by_spend(&input.purchase_orders, &input.vendors, 5),
    }
}
