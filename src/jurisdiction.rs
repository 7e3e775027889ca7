//! Jurisdiction profiles: the regulatory framing the prompt builder renders a
//! narrative against. `IN` is the default; unknown codes fall back to it.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JurisdictionProfile {
    pub code: &'static str,
    pub regulatory_body: &'static str,
    pub currency_symbol: &'static str,
    pub identity_name: &'static str,
    pub filing_threshold: &'static str,
    pub legal_terminology: &'static str,
    pub reporting_form: &'static str,
    pub sar_sections: [&'static str; 4],
}

/// Resolve a jurisdiction code to its profile.
pub fn profile(code: &str) -> JurisdictionProfile {
    match code {
        "US" => JurisdictionProfile {
            code: "US",
            regulatory_body: "Financial Crimes Enforcement Network (FinCEN)",
            currency_symbol: "$",
            identity_name: "SSN/EIN",
            filing_threshold: "$10,000",
            legal_terminology: "Bank Secrecy Act (BSA) / USA PATRIOT Act",
            reporting_form: "FinCEN SAR Form",
            sar_sections: [
                "Subject Information",
                "Suspicious Activity Information",
                "Narrative",
                "Filing Institution Contact",
            ],
        },
        "UK" => JurisdictionProfile {
            code: "UK",
            regulatory_body: "National Crime Agency (NCA)",
            currency_symbol: "£",
            identity_name: "NI Number",
            filing_threshold: "£10,000",
            legal_terminology: "Proceeds of Crime Act 2002 (POCA) / JMLSG Guidance",
            reporting_form: "SAR (Defence / Consent / Information)",
            sar_sections: [
                "Subject Details",
                "Reason for Suspicion",
                "Transaction Details",
                "Reporting Officer Assessment",
            ],
        },
        "EU" => JurisdictionProfile {
            code: "EU",
            regulatory_body: "EU Anti-Money Laundering Authority (AMLA)",
            currency_symbol: "€",
            identity_name: "National ID / Passport",
            filing_threshold: "€15,000",
            legal_terminology: "EU 6th Anti-Money Laundering Directive (6AMLD)",
            reporting_form: "STR (Suspicious Transaction Report)",
            sar_sections: [
                "Subject Identification",
                "Suspicious Activity Description",
                "Transaction Analysis",
                "Risk Assessment and Recommendation",
            ],
        },
        _ => JurisdictionProfile {
            code: "IN",
            regulatory_body: "Financial Intelligence Unit (FIU-IND)",
            currency_symbol: "₹",
            identity_name: "Aadhaar/PAN",
            filing_threshold: "₹1,000,000",
            legal_terminology: "Money Laundering (Prevention) Act (PMLA)",
            reporting_form: "STR (Suspicious Transaction Report)",
            sar_sections: [
                "Subject Information",
                "Suspicious Activity Description",
                "Supporting Evidence",
                "Analyst Assessment",
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_india() {
        assert_eq!(profile("IN").currency_symbol, "₹");
        assert_eq!(profile("XX").code, "IN");
    }

    #[test]
    fn test_known_jurisdictions() {
        assert_eq!(profile("US").currency_symbol, "$");
        assert_eq!(profile("UK").reporting_form, "SAR (Defence / Consent / Information)");
        assert_eq!(profile("EU").sar_sections.len(), 4);
    }
}
