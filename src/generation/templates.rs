use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use super::types::{BrandGender, GeneratedVariant, GenerationRequest, MAX_KEYWORDS};
use super::TemplateEngine;
use crate::error::GenerationError;

type Template = fn(&Brief) -> String;

const FACEBOOK: [Template; 3] = [facebook_offer, facebook_pride, facebook_hot_deal];
const INSTAGRAM: [Template; 2] = [instagram_short, instagram_premium];

/// In-process template filler used when no remote generator is configured.
///
/// Templates are picked per platform; unknown platforms fall back to the
/// Facebook set.
#[derive(Debug, Default, Clone)]
pub struct LocalTemplateEngine;

impl LocalTemplateEngine {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, request: &GenerationRequest) -> Vec<GeneratedVariant> {
        let templates: &[Template] = match request.platform.as_str() {
            "instagram" => &INSTAGRAM,
            _ => &FACEBOOK,
        };

        let brief = Brief::from(request);
        let keywords = extract_keywords(request);
        let stamp = Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();

        templates
            .iter()
            .enumerate()
            .map(|(index, template)| GeneratedVariant {
                id: format!("content_{}_{}", index + 1, stamp),
                content: template(&brief),
                quality_score: rng.gen_range(80..100),
                engagement_prediction: rng.gen_range(60..90),
                keywords: keywords.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl TemplateEngine for LocalTemplateEngine {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedVariant>, GenerationError> {
        Ok(self.render(request))
    }
}

struct Brief<'a> {
    business: &'a str,
    hashtag: String,
    product: &'a str,
    audience: &'a str,
    platform: &'a str,
    // First-person plural: ကျွန်တော်တို့ / ကျွန်မတို့
    we: &'static str,
}

impl<'a> From<&'a GenerationRequest> for Brief<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        let we = match request.brand_gender {
            BrandGender::Female => "ကျွန်မတို့",
            BrandGender::Male | BrandGender::Neutral => "ကျွန်တော်တို့",
        };

        Self {
            business: &request.business_name,
            hashtag: compact(&request.business_name),
            product: &request.product_service,
            audience: &request.target_audience,
            platform: &request.platform,
            we,
        }
    }
}

fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}

fn facebook_offer(b: &Brief) -> String {
    format!(
        "🌟 {business} ရဲ့ {product} အထူးကမ်းလှမ်းချက်!\n\n\
         {audience} တွေအတွက် {we}ရဲ့ ဝန်ဆောင်မှုကို ဂရုတစိုက် ပြင်ဆင်ထားပါတယ်။\n\n\
         📞 ဆက်သွယ်ရန် - [ဖုန်းနံပါတ်]\n📍 လိပ်စာ - [လိပ်စာ]\n\n\
         #{hashtag} #Myanmar #{platform} #မြန်မာ",
        business = b.business,
        product = b.product,
        audience = b.audience,
        we = b.we,
        hashtag = b.hashtag,
        platform = b.platform,
    )
}

fn facebook_pride(b: &Brief) -> String {
    format!(
        "✨ {business} မှ ဂုဏ်ယူစွာ မိတ်ဆက်ပါတယ်!\n\n\
         {we}ရဲ့ {product} ကို {audience} တွေအတွက် အထူးဖန်တီးထားပါတယ်။\n\n\
         🎯 လာရောက်အားပေးဖို့ ဖိတ်ခေါ်ပါတယ်!\n\n\
         #MyanmarBusiness #{hashtag} #{platform}Content",
        business = b.business,
        product = b.product,
        audience = b.audience,
        we = b.we,
        hashtag = b.hashtag,
        platform = b.platform,
    )
}

fn facebook_hot_deal(b: &Brief) -> String {
    format!(
        "🔥 {business} Hot Deal!\n\n\
         {audience} တွေအတွက် အထူးလျှော့ဈေး! {we}ရဲ့ {product} ကို အခုပဲ မှာယူလိုက်ပါ။\n\n\
         💰 အထူးဈေးနှုန်း\n⏰ အချိန်အကန့်အသတ်ဖြင့်သာ\n\n\
         #{hashtag} #SpecialOffer #Myanmar #OrderNow",
        business = b.business,
        product = b.product,
        audience = b.audience,
        we = b.we,
        hashtag = b.hashtag,
    )
}

fn instagram_short(b: &Brief) -> String {
    format!(
        "{business} 💫\n\n{product} for {audience}\n\n#{hashtag} #Myanmar #Insta #Local",
        business = b.business,
        product = b.product,
        audience = b.audience,
        hashtag = b.hashtag,
    )
}

fn instagram_premium(b: &Brief) -> String {
    format!(
        "✨ Premium {product} ✨\n\nPerfect for {audience}\n📍 Myanmar\n🔥 Order now!\n\n#MyanmarBusiness #Premium #{hashtag}",
        product = b.product,
        audience = b.audience,
        hashtag = b.hashtag,
    )
}

fn extract_keywords(request: &GenerationRequest) -> Vec<String> {
    let mut keywords = vec![
        compact(&request.business_name),
        "Myanmar".to_string(),
        request.platform.clone(),
    ];

    match request.content_type.as_str() {
        "promotion" => keywords.extend(["SpecialOffer", "Promotion", "Deal"].map(String::from)),
        "announcement" => keywords.extend(["News", "Update", "Announcement"].map(String::from)),
        _ => {}
    }

    match request.tone.as_str() {
        "professional" => keywords.extend(["Professional", "Quality"].map(String::from)),
        "friendly" => keywords.extend(["Friendly", "Welcome"].map(String::from)),
        _ => {}
    }

    keywords.truncate(MAX_KEYWORDS);
    keywords
}
