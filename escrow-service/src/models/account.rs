use serde::{Deserialize, Serialize};

/// Provider or user profile; only the fields needed for notifications and
/// payouts are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub payout_details: Option<PayoutDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayoutDetails {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub ifsc: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Bank details with every field needed to build a fund account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccount {
    pub account_number: String,
    pub ifsc: String,
    pub holder_name: String,
}

impl PayoutDetails {
    pub fn to_bank_account(&self) -> Option<BankAccount> {
        let present = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Some(BankAccount {
            account_number: present(&self.account)?,
            ifsc: present(&self.ifsc)?,
            holder_name: present(&self.name)?,
        })
    }
}

impl Account {
    pub fn bank_account(&self) -> Option<BankAccount> {
        self.payout_details.as_ref()?.to_bank_account()
    }
}
