/// WhatsApp handoff
///
/// Inquiries end in a wa.me link with a prefilled message. Nothing is
/// awaited once the link is opened.

use crate::state::data::Vehicle;

/// Dealership WhatsApp line
pub const DEFAULT_WHATSAPP_NUMBER: &str = "+233551171353";

/// A prefilled WhatsApp chat link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppLink {
    phone: String,
    text: String,
}

impl WhatsAppLink {
    /// Only the digits of `phone` are kept ("+233 55" -> "23355")
    pub fn new(phone: &str, text: impl Into<String>) -> Self {
        Self {
            phone: phone.chars().filter(char::is_ascii_digit).collect(),
            text: text.into(),
        }
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// `https://wa.me/<digits>?text=<percent-encoded text>`
    pub fn to_url(&self) -> String {
        format!(
            "https://wa.me/{}?text={}",
            self.phone,
            urlencoding::encode(&self.text)
        )
    }
}

impl std::fmt::Display for WhatsAppLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_url())
    }
}

/// Buy-now form submission
#[derive(Debug, Clone, Default)]
pub struct PurchaseInquiry {
    pub vehicle: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub payment_method: String,
    pub notes: String,
}

impl PurchaseInquiry {
    pub fn message(&self) -> String {
        format!(
            "*New Purchase Inquiry* 🚗\n\n*Vehicle:* {}\n*Customer:* {}\n*Email:* {}\n\
             *Phone:* {}\n*Payment:* {}\n\n*Message:* {}",
            self.vehicle, self.name, self.email, self.phone, self.payment_method, self.notes
        )
    }
}

/// Test drive booking
#[derive(Debug, Clone, Default)]
pub struct TestDriveRequest {
    pub name: String,
    pub phone: String,
    /// Vehicle title; empty when the customer did not pick one
    pub vehicle: String,
    pub date: String,
    pub time: String,
}

impl TestDriveRequest {
    pub fn message(&self) -> String {
        let vehicle = if self.vehicle.is_empty() {
            "Test Drive Request"
        } else {
            &self.vehicle
        };
        format!(
            "Jambo! Test Drive Request:\n- Name: {}\n- Phone: {}\n- Vehicle: {}\n- Date: {} {}",
            self.name, self.phone, vehicle, self.date, self.time
        )
    }
}

/// Spare part quote request
#[derive(Debug, Clone, Default)]
pub struct PartInquiry {
    pub part_name: Option<String>,
    pub part_number: Option<String>,
    pub quantity: u32,
    pub name: String,
    pub phone: String,
    pub vehicle_info: Option<String>,
    pub message: Option<String>,
}

impl PartInquiry {
    pub fn message(&self) -> String {
        let or_na = |v: &Option<String>| {
            v.clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "N/A".to_string())
        };
        let note = self
            .message
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "I am interested in this part.".to_string());
        format!(
            "*New Part Inquiry*\n\n*Part:* {}\n*Part #:* {}\n*Qty:* {}\n\n\
             *Customer:* {}\n*Phone:* {}\n*Vehicle:* {}\n\n*Message:* {}",
            or_na(&self.part_name),
            or_na(&self.part_number),
            self.quantity,
            self.name,
            self.phone,
            or_na(&self.vehicle_info),
            note
        )
    }
}

/// One test drive request covering every vehicle in the garage
pub fn garage_test_drive_message(vehicles: &[Vehicle]) -> String {
    let mut message =
        String::from("Jambo! I'd like to test drive these cars from my Dream Garage:");
    for (i, vehicle) in vehicles.iter().enumerate() {
        message.push_str(&format!("\n{}. {} (ID: {})", i + 1, vehicle.title(), vehicle.id));
    }
    message
}
