use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// surrogate identifier for a loan record
pub type LoanKey = Uuid;

/// identifier of a bank branch
pub type BranchId = u64;

/// loan products offered by the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    Home,
    Car,
    Personal,
    Education,
    Gold,
    Industrial,
    WorkingCapital,
    ImportLc,
}

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// submitted, awaiting decision
    Application,
    /// approved, funds not yet released
    Approved,
    /// disbursed and in repayment
    Active,
    /// fully repaid or foreclosed
    Closed,
    /// installments overdue beyond the default threshold
    Defaulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisbursementStatus {
    Pending,
    Completed,
    Failed,
}

/// repayment schedule entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Overdue,
    Waived,
}

impl InstallmentStatus {
    /// still owed by the borrower
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InstallmentStatus::Pending | InstallmentStatus::Overdue)
    }
}

/// review stage an approval decision was taken at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStage {
    ApplicationReview,
    CreditAssessment,
    FinalApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRating {
    Low,
    Moderate,
    High,
    VeryHigh,
}

/// caller roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    BranchManager,
    LoanOfficer,
    Customer,
    CardOfficer,
    Teller,
    /// sentinel principal for scheduled jobs and system-authored entries
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Suspended,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
    Frozen,
    Closed,
}

/// channel a repayment or settlement arrives through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    Cash,
    Transfer,
    Cheque,
    Online,
    AutoDebit,
}

/// collateral pledged against a secured loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collateral {
    pub collateral_type: String,
    pub value: crate::decimal::Money,
    pub description: Option<String>,
}

/// letter of credit details for import financing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterOfCredit {
    pub lc_number: String,
    pub beneficiary: String,
    pub expiry_date: chrono::NaiveDate,
}

/// business details for industrial and working-capital loans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessDetails {
    pub business_name: String,
    pub registration_number: String,
    pub annual_turnover: Option<crate::decimal::Money>,
}

/// type-specific terms carried with the loan; not part of the core math
/// except for collateral value during eligibility
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoanDetails {
    pub collateral: Option<Collateral>,
    pub letter_of_credit: Option<LetterOfCredit>,
    pub business: Option<BusinessDetails>,
    pub purpose: Option<String>,
}

impl LoanDetails {
    pub fn collateral_value(&self) -> crate::decimal::Money {
        self.collateral
            .as_ref()
            .map(|c| c.value)
            .unwrap_or(crate::decimal::Money::ZERO)
    }
}
