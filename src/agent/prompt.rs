//! System prompt templates for the agent.
//!
//! One template per intent, selected by an exhaustive match so a missing
//! mapping is a compile error rather than a request-time surprise.

use crate::llm::{ChatMessage, Role};
use crate::tools::ToolRegistry;

use super::intent::Intent;

/// Generic reply shown when a turn fails unrecoverably.
pub const FALLBACK_REPLY: &str =
    "Xin lỗi, đã có lỗi xảy ra trong quá trình xử lý. Bạn vui lòng thử lại sau nhé.";

/// How many trailing messages of context the classifier sees.
const CLASSIFIER_CONTEXT_WINDOW: usize = 6;

const PERSONA: &str = "Bạn là trợ lý du lịch Việt Nam thân thiện, trả lời bằng tiếng Việt, am hiểu các tỉnh thành, điểm tham quan, ẩm thực và văn hóa địa phương.";

/// Select the system-prompt template for an intent.
pub fn system_prompt(intent: Intent) -> &'static str {
    match intent {
        Intent::General => {
            "Trả lời các câu hỏi du lịch một cách ngắn gọn, chính xác và hữu ích. Nếu câu hỏi không liên quan đến du lịch, hãy lịch sự hướng người dùng quay lại chủ đề du lịch."
        }
        Intent::Search => {
            "Người dùng cần thông tin thời sự (giá cả, tình trạng phòng, lịch trình, thời tiết). Kiến thức của bạn có thể đã cũ: hãy dùng công cụ web_search để lấy thông tin mới nhất, sau đó tóm tắt kết quả kèm nguồn."
        }
        Intent::Greeting => {
            "Người dùng đang chào hỏi. Hãy chào lại thân thiện, giới thiệu ngắn gọn rằng bạn có thể gợi ý điểm đến, khách sạn, phương tiện di chuyển, hoạt động vui chơi và lập lịch trình chi tiết."
        }
        Intent::Accommodation => {
            "Tư vấn chỗ ở: khách sạn, homestay, resort phù hợp với ngân sách và vị trí người dùng mong muốn. Với giá phòng và tình trạng phòng hiện tại, hãy dùng web_search thay vì đoán."
        }
        Intent::Destination => {
            "Gợi ý điểm đến phù hợp với sở thích, thời gian và ngân sách của người dùng. Nêu điểm nổi bật, mùa đẹp nhất và vài lưu ý thực tế cho từng nơi."
        }
        Intent::Transportation => {
            "Tư vấn phương tiện di chuyển: máy bay, tàu hỏa, xe khách, xe máy. Với lịch chạy và giá vé hiện tại, hãy dùng web_search để kiểm tra trước khi trả lời."
        }
        Intent::Activities => {
            "Gợi ý hoạt động: tham quan, ẩm thực, lễ hội, trải nghiệm địa phương. Sắp xếp theo mức độ phù hợp và nêu chi phí ước tính nếu biết."
        }
        Intent::GenerateItinerary => {
            "Lập lịch trình chi tiết theo từng ngày. Mỗi ngày chia ba buổi sáng/chiều/tối, mỗi buổi gồm hoạt động cụ thể và chi phí ước tính bằng VND. KHÔNG tự ý lưu lịch trình: chỉ gọi công cụ save_itinerary khi người dùng nói rõ muốn lưu."
        }
        Intent::SaveItinerary => {
            "Người dùng muốn lưu lịch trình vừa bàn. Hãy gọi công cụ save_itinerary với điểm đến, thời lượng và danh sách ngày (sáng/chiều/tối kèm chi phí) lấy từ hội thoại. Sau khi lưu thành công, xác nhận lại bằng đúng thông báo của công cụ."
        }
    }
}

/// Build the full system prompt: persona, intent template, tool listing.
pub fn build_system_prompt(intent: Intent, tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{persona}\n\n{template}\n\n## Công cụ\n\nBạn có thể gọi các công cụ sau khi cần:\n{tool_descriptions}",
        persona = PERSONA,
        template = system_prompt(intent),
        tool_descriptions = tool_descriptions
    )
}

/// Build the classifier's system prompt with recent conversation context.
pub fn build_classification_prompt(history: &[ChatMessage]) -> String {
    let labels = Intent::ALL
        .iter()
        .map(|i| i.label())
        .collect::<Vec<_>>()
        .join(", ");

    let context = recent_context(history, CLASSIFIER_CONTEXT_WINDOW);
    let context_section = if context.is_empty() {
        String::new()
    } else {
        format!("\n\nHội thoại gần đây:\n{}", context)
    };

    format!(
        r#"Phân loại tin nhắn mới nhất của người dùng vào đúng MỘT nhãn trong danh sách sau: {labels}.

Quy tắc:
- "search": cần thông tin thời sự như giá cả, tình trạng phòng, lịch chạy, thời tiết.
- "generate_itinerary": yêu cầu lập lịch trình theo ngày.
- "save_itinerary": yêu cầu rõ ràng lưu/thêm lịch trình đã có.
- Nếu tin nhắn mơ hồ, chỉ tiếp nối câu trước ("tiếp tục", "ok làm đi") và không tự mang ý định nào, trả lời "vague".
- Không chắc chắn thì trả lời "general".

Chỉ trả lời đúng một nhãn, không giải thích.{context_section}"#,
        labels = labels,
        context_section = context_section
    )
}

/// Render the trailing window of user/assistant text turns.
fn recent_context(history: &[ChatMessage], window: usize) -> String {
    let lines: Vec<String> = history
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .filter_map(|m| {
            m.content.as_deref().map(|text| {
                let speaker = if m.role == Role::User {
                    "Người dùng"
                } else {
                    "Trợ lý"
                };
                format!("{}: {}", speaker, text)
            })
        })
        .collect();

    let start = lines.len().saturating_sub(window);
    lines[start..].join("\n")
}
