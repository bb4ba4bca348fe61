//! 题目构建上下文
//!
//! 封装"我正在为哪个任务、哪两个方法、第几行生成题目"这一信息

use std::fmt::Display;

use crate::models::TaskKind;

/// 题目构建上下文
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    pub task: TaskKind,
    pub method_a: String,
    pub method_b: String,
    pub path_a: String,
    pub path_b: String,
    /// 在来源文件中的行号
    pub row_index: usize,
    /// 在题库中的序号（从1开始，仅用于日志）
    pub position: usize,
}

impl QuestionCtx {
    /// 生成同一批次下另一行的上下文
    pub fn at(&self, row_index: usize, position: usize) -> Self {
        Self {
            row_index,
            position,
            ..self.clone()
        }
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} 题目#{} 行#{}]",
            self.task, self.position, self.row_index
        )
    }
}
