/// 日志工具模块
///
/// 提供日志初始化以及各阶段的格式化输出
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器
///
/// 级别由 `RUST_LOG` 控制，默认 `info`；重复调用是安全的（测试中会多次调用）。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录阶段启动信息
///
/// # 参数
/// - `stage`: 阶段名称
/// - `detail`: 附加说明（输入文件等）
pub fn log_stage_start(stage: &str, detail: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 {} - {}", stage, chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("📄 {}", detail);
    info!("{}", "=".repeat(60));
}

/// 记录批次提交进度
pub fn log_batch_committed(done: usize, total: usize) {
    info!("📦 已提交 {}/{}", done, total);
}

/// 打印阶段完成统计
///
/// # 参数
/// - `stage`: 阶段名称
/// - `lines`: 统计行（标签, 数值）
pub fn print_stage_stats(stage: &str, lines: &[(&str, String)]) {
    info!("\n{}", "─".repeat(60));
    info!("📊 {} 完成", stage);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for (label, value) in lines {
        info!("  {}: {}", label, value);
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars_not_bytes() {
        assert_eq!(truncate_text("目标价值观", 2), "目标...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
