// ==========================================
// 表格数据导入工具 - 保存确认
// ==========================================
// 职责: 在会话末尾询问是否提交（唯一的决策点）
// 约定: 空输入视为确认；--yes 时使用 AutoConfirm 跳过询问
// ==========================================

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

// ==========================================
// UserConfirmation Trait
// ==========================================
pub trait UserConfirmation {
    /// 展示提示并返回用户是否确认
    fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// 解析确认输入: 空 / y / Y / yes 为确认
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim(), "" | "y" | "Y" | "yes" | "Yes" | "YES")
}

// ==========================================
// 自动确认（--yes）
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl UserConfirmation for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        Ok(true)
    }
}

// ==========================================
// 交互式确认
// ==========================================
// 提示写入 output，答案从 input 读取一行
pub struct PromptConfirmation<R: BufRead, W: Write> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> PromptConfirmation<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }
}

impl<R: BufRead, W: Write> UserConfirmation for PromptConfirmation<R, W> {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        {
            let mut output = self.output.borrow_mut();
            write!(output, "{} [Y/n] ", prompt)?;
            output.flush()?;
        }

        let mut answer = String::new();
        let read = self.input.borrow_mut().read_line(&mut answer)?;
        if read == 0 {
            // 输入已关闭，不做隐式提交
            return Ok(false);
        }
        Ok(is_affirmative(&answer))
    }
}

/// 标准输入/输出上的确认
pub type StdinConfirmation = PromptConfirmation<io::StdinLock<'static>, io::Stdout>;

impl StdinConfirmation {
    pub fn stdin() -> Self {
        PromptConfirmation::new(io::stdin().lock(), io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative(""));
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" Y "));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("no"));
    }

    #[test]
    fn test_prompt_confirmation_reads_answer() {
        let confirm = PromptConfirmation::new(&b"n\n"[..], Vec::new());
        assert!(!confirm.confirm("保存?").unwrap());

        let output = confirm.output.borrow();
        assert_eq!(String::from_utf8_lossy(&output), "保存? [Y/n] ");
    }

    #[test]
    fn test_prompt_confirmation_empty_line_accepts() {
        let confirm = PromptConfirmation::new(&b"\n"[..], Vec::new());
        assert!(confirm.confirm("保存?").unwrap());
    }

    #[test]
    fn test_prompt_confirmation_closed_input_declines() {
        let confirm = PromptConfirmation::new(&b""[..], Vec::new());
        assert!(!confirm.confirm("保存?").unwrap());
    }

    #[test]
    fn test_auto_confirm() {
        assert!(AutoConfirm.confirm("保存?").unwrap());
    }
}
