//! Search filter sent with every result-page query

use serde::Serialize;

/// Lower and upper bound of a numeric filter, sent as strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub gt: &'static str,
    pub lt: &'static str,
}

/// Seller filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserFilter {
    pub dealer: &'static str,
    pub official: &'static str,
    pub id: &'static str,
}

/// The fixed listing category/price/year/mileage/customs constraints
///
/// Every page query of a crawl uses the same filter; only the page number varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchFilter {
    pub category: &'static str,
    pub sort: &'static str,
    pub layout: &'static str,
    pub user: UserFilter,
    pub year: Bounds,
    pub usdprice: Bounds,
    pub custcleared: &'static str,
    pub mileage: Bounds,
}

/// Wire form of one query; field order matches what the site's own frontend sends
#[derive(Serialize)]
struct SearchQuery<'a> {
    category: &'a str,
    page: String,
    sort: &'a str,
    layout: &'a str,
    user: &'a UserFilter,
    year: &'a Bounds,
    usdprice: &'a Bounds,
    custcleared: &'a str,
    mileage: &'a Bounds,
}

impl SearchFilter {
    /// Passenger cars, any seller, customs-cleared, newest first
    pub const STANDARD: SearchFilter = SearchFilter {
        category: "1",
        sort: "latest",
        layout: "list",
        user: UserFilter {
            dealer: "0",
            official: "0",
            id: "",
        },
        year: Bounds {
            gt: "1911",
            lt: "2025",
        },
        usdprice: Bounds {
            gt: "0",
            lt: "100000000",
        },
        custcleared: "1",
        mileage: Bounds {
            gt: "10",
            lt: "10000000",
        },
    };

    /// JSON value of the `search` form field for the given page
    pub fn query_json(&self, page: u32) -> Result<String, serde_json::Error> {
        serde_json::to_string(&SearchQuery {
            category: self.category,
            page: page.to_string(),
            sort: self.sort,
            layout: self.layout,
            user: &self.user,
            year: &self.year,
            usdprice: &self.usdprice,
            custcleared: self.custcleared,
            mileage: &self.mileage,
        })
    }
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self::STANDARD
    }
}
