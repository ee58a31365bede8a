use std::fmt::Write;

use crate::models::SearchResult;

/** \brief 每条近似检索结果之后的分隔线。 */
pub const DIVIDER: &str = "---";

/**
 * \brief 把解码后的回复渲染为纯文本块。
 * \details 先输出生成文本，再逐条输出资产名、两位小数分数与片段范围。
 */
pub fn render(result: &SearchResult) -> String {
    let mut out = String::new();
    // String 写入不会失败
    let _ = write_into(&mut out, result);
    out
}

fn write_into(out: &mut String, result: &SearchResult) -> std::fmt::Result {
    writeln!(out, "Generated Response:")?;
    writeln!(out)?;
    writeln!(out, "{}", result.generated_response)?;
    writeln!(out)?;
    writeln!(out, "Proximity Search Results:")?;
    for m in &result.proximity_matches {
        writeln!(out, "Asset: {} (Score: {:.2})", m.asset_name, m.score)?;
        writeln!(out, "Range: {} - {}", m.range_from, m.range_to)?;
        writeln!(out, "{}", DIVIDER)?;
    }
    Ok(())
}
