use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_id: Option<String>,
    pub features: Vec<String>,
}

/// The plans offered on the pricing page. Price ids come from configuration
/// and are omitted when unset.
pub fn catalogue(
    daily_limit: u32,
    free_upload_mb: u64,
    pro_upload_mb: u64,
    monthly_price_id: Option<&str>,
    yearly_price_id: Option<&str>,
) -> Vec<Plan> {
    let features = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

    vec![
        Plan {
            id: "free",
            name: "Free",
            price: 0.0,
            price_id: None,
            features: vec![
                format!("{} conversions per day", daily_limit),
                "Basic file processing".to_string(),
                "Standard processing speed".to_string(),
                format!("Files up to {}MB", free_upload_mb),
            ],
        },
        Plan {
            id: "pro_monthly",
            name: "Pro Monthly",
            price: 9.99,
            price_id: monthly_price_id.map(str::to_string),
            features: [
                features(&["Unlimited conversions", "All tools included", "Priority processing"]),
                vec![format!("Files up to {}MB", pro_upload_mb)],
                features(&["No ads", "Email support"]),
            ]
            .concat(),
        },
        Plan {
            id: "pro_yearly",
            name: "Pro Yearly",
            price: 79.99,
            price_id: yearly_price_id.map(str::to_string),
            features: features(&[
                "Everything in Pro Monthly",
                "Save 33% annually",
                "Priority email support",
                "Early access to new features",
            ]),
        },
    ]
}
