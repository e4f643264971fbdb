//! Canned answers used whenever the upstream APIs are unavailable.

const ACCOUNT_ANSWER: &str = "To open a UBL account, you can visit any UBL branch with the required documents including your CNIC, proof of income, and address verification. You can also start the process online at ubldigital.com. UBL offers various account types including current, savings, and business accounts with competitive interest rates.";

const LOAN_ANSWER: &str = "UBL offers various loan products including personal loans, home loans, and business loans. You can apply online through ubldigital.com or visit any UBL branch for more information about loan products, interest rates, and eligibility criteria.";

const CARD_ANSWER: &str = "UBL provides a range of debit and credit cards with various benefits. You can apply for cards online at ubldigital.com or visit any UBL branch. Cards come with features like cashback, rewards, and international usage.";

const DIGITAL_ANSWER: &str = "UBL offers digital banking services through their mobile app and online platform. You can access your accounts, transfer money, pay bills, and manage your finances digitally. Visit ubldigital.com to learn more about their digital services.";

const RATES_ANSWER: &str = "UBL offers competitive interest rates on savings accounts, fixed deposits, and other investment products. Current rates and terms may vary, so I recommend visiting ubldigital.com or contacting a UBL branch for the most up-to-date information.";

pub const DEFAULT_ANSWER: &str = "I'm here to help with your UBL banking needs! You can ask me about account opening, loans, cards, digital banking, or any other UBL services. For the most current information, you can also visit ubldigital.com or contact your nearest UBL branch.";

/// Checked top to bottom; the first group with a matching keyword wins.
const KEYWORD_GROUPS: &[(&[&str], &str)] = &[
    (&["account", "open"], ACCOUNT_ANSWER),
    (&["loan", "credit"], LOAN_ANSWER),
    (&["card", "debit", "credit card"], CARD_ANSWER),
    (&["mobile", "app", "digital"], DIGITAL_ANSWER),
    (&["interest", "rate"], RATES_ANSWER),
];

/// Keyword matcher mapping a user utterance to a canned banking answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackResponder;

impl FallbackResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn respond(&self, text: &str) -> &'static str {
        let lowered = text.to_lowercase();
        KEYWORD_GROUPS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(_, answer)| *answer)
            .unwrap_or(DEFAULT_ANSWER)
    }
}
