//! User-facing text: error messages and tuning recommendations per language.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, MissingInputKind};

/// Language of user-facing text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Arabic, the language the service was first published in.
    #[default]
    Ar,
    En,
}

/// Message shown to the user for a failed analysis.
pub fn error_message(locale: Locale, err: &AnalysisError) -> String {
    match (locale, err) {
        (Locale::Ar, AnalysisError::MissingInput(MissingInputKind::NoFile)) => {
            "لم يتم العثور على ملف صوتي".to_string()
        }
        (Locale::Ar, AnalysisError::MissingInput(MissingInputKind::EmptyFile)) => {
            "ملف صوتي فارغ".to_string()
        }
        (Locale::Ar, AnalysisError::InsufficientEvidence { .. }) => {
            "لم يتمكن من تحديد نغمة واضحة. يرجى النفخ بشكل أطول وأكثر ثباتًا.".to_string()
        }
        (Locale::Ar, AnalysisError::InvalidFrequency { .. }) => "تردد غير صالح".to_string(),
        (Locale::Ar, AnalysisError::TooLong { max_secs, .. }) => {
            format!("التسجيل طويل جدًا. الحد الأقصى {max_secs:.0} ثانية.")
        }
        (Locale::Ar, AnalysisError::Decode { primary, fallback }) => format!(
            "حدث خطأ في الخادم: خطأ في قراءة الملف الصوتي: {primary}; تحويل ffmpeg فشل: {fallback}"
        ),
        (Locale::Ar, AnalysisError::Internal(msg)) => format!("حدث خطأ في الخادم: {msg}"),

        (Locale::En, AnalysisError::MissingInput(MissingInputKind::NoFile)) => {
            "No audio file was found in the request".to_string()
        }
        (Locale::En, AnalysisError::MissingInput(MissingInputKind::EmptyFile)) => {
            "The audio file is empty".to_string()
        }
        (Locale::En, AnalysisError::InsufficientEvidence { .. }) => {
            "Could not find a clear pitch. Please blow longer and more steadily.".to_string()
        }
        (Locale::En, AnalysisError::InvalidFrequency { .. }) => "Invalid frequency".to_string(),
        (Locale::En, AnalysisError::TooLong { max_secs, .. }) => {
            format!("The recording is too long. The limit is {max_secs:.0} seconds.")
        }
        (Locale::En, AnalysisError::Decode { primary, fallback }) => format!(
            "Server error: could not read the audio file: {primary}; ffmpeg conversion failed: {fallback}"
        ),
        (Locale::En, AnalysisError::Internal(msg)) => format!("Server error: {msg}"),
    }
}

/// Advice for a player using a standard 440 Hz instrument.
pub fn recommendation_standard(locale: Locale, ney_at_440_produces: f64, ideal_ney_for_440: f64) -> String {
    match locale {
        Locale::Ar => format!(
            "إذا عزفت على ناي قياسي (440 ذ/ث)، ستكون النغمة الناتجة {ney_at_440_produces:.2} ذ/ث. \
             للحصول على نغمة 440 ذ/ث مضبوطة، تحتاج إلى ناي بمقياس {ideal_ney_for_440:.2} ذ/ث."
        ),
        Locale::En => format!(
            "On a standard ney (440 Hz) your tone would sound at {ney_at_440_produces:.2} Hz. \
             To sound an in-tune 440 Hz you need a ney scaled at {ideal_ney_for_440:.2} Hz."
        ),
    }
}

/// The player's own effective reference pitch.
pub fn recommendation_custom(locale: Locale, a4_actual: f64) -> String {
    match locale {
        Locale::Ar => format!("مقياس نفختك الفعلي هو {a4_actual:.2} ذ/ث."),
        Locale::En => format!("Your actual breath scale is {a4_actual:.2} Hz."),
    }
}
