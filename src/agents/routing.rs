//! Query routing
//!
//! Picks the primary specialist for a query from keyword sets checked in
//! a fixed priority order. All specialists still run; the primary one is
//! logged first and leads the final synthesis.

use super::Specialist;

/// Checked top to bottom; first hit wins.
const ROUTES: &[(Specialist, &[&str])] = &[
    (
        Specialist::Investment,
        &[
            "investment", "portfolio", "sip", "mutual fund", "stocks", "returns",
            "underperformed", "market", "fund", "equity", "debt fund",
        ],
    ),
    (
        Specialist::Debt,
        &[
            "loan", "debt", "credit", "emi", "interest", "afford", "borrow",
            "mortgage", "credit card",
        ],
    ),
    (
        Specialist::Wealth,
        &[
            "net worth", "networth", "wealth", "retirement", "savings", "goals",
            "future", "projection", "planning", "financial plan",
        ],
    ),
    (
        Specialist::Health,
        &[
            "anomaly", "unusual", "spending", "pattern", "risk", "health",
            "monitor", "alert", "warning", "issue", "stress",
        ],
    ),
];

/// Cash flow handles anything no keyword set claims.
pub fn route_query(query: &str) -> Specialist {
    let lower = query.to_lowercase();

    ROUTES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(specialist, _)| *specialist)
        .unwrap_or(Specialist::CashFlow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        let cases = vec![
            ("Should I increase my SIP?", Specialist::Investment),
            ("Can I afford a home loan?", Specialist::Debt),
            ("What will my net worth be at 40?", Specialist::Wealth),
            ("Any unusual spending this month?", Specialist::Health),
            ("how can I save more", Specialist::CashFlow),
        ];

        for (query, expected) in cases {
            assert_eq!(route_query(query), expected, "query: {}", query);
        }
    }

    #[test]
    fn test_priority_order() {
        // "debt fund" is an investment term even though it mentions debt
        assert_eq!(route_query("is a debt fund safe?"), Specialist::Investment);
    }
}
