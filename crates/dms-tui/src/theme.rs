use dms_core::{StatusClass, ValidationKind};
use ratatui::style::{Color, Modifier, Style};

/// 256-colour palette for the fleet screens.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub primary: Color,
    pub secondary: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub muted: Color,
    pub accent: Color,
    pub highlight: Color,
    pub info: Color,
    pub value: Color,
    pub number: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Indexed(86),
            secondary: Color::Indexed(212),
            success: Color::Indexed(42),
            error: Color::Indexed(196),
            warning: Color::Indexed(220),
            muted: Color::Indexed(241),
            accent: Color::Indexed(147),
            highlight: Color::Indexed(215),
            info: Color::Indexed(39),
            value: Color::Indexed(252),
            number: Color::Indexed(114),
        }
    }
}

impl Theme {
    pub fn title(&self) -> Style {
        Style::new().fg(self.primary).add_modifier(Modifier::BOLD)
    }

    pub fn label(&self) -> Style {
        Style::new().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn value(&self) -> Style {
        Style::new().fg(self.value)
    }

    pub fn section(&self) -> Style {
        Style::new().fg(self.highlight).add_modifier(Modifier::BOLD)
    }

    pub fn table_header(&self) -> Style {
        Style::new().fg(self.info).add_modifier(Modifier::BOLD)
    }

    pub fn number(&self) -> Style {
        Style::new().fg(self.number)
    }

    pub fn arn(&self) -> Style {
        Style::new().fg(self.muted).add_modifier(Modifier::ITALIC)
    }

    pub fn muted(&self) -> Style {
        Style::new().fg(self.muted)
    }

    pub fn cursor(&self) -> Style {
        Style::new().fg(self.secondary).add_modifier(Modifier::BOLD)
    }

    pub fn checkmark(&self) -> Style {
        Style::new().fg(self.success).add_modifier(Modifier::BOLD)
    }

    pub fn error(&self) -> Style {
        Style::new().fg(self.error).add_modifier(Modifier::BOLD)
    }

    pub fn warning(&self) -> Style {
        Style::new().fg(self.warning)
    }

    pub fn status(&self, class: StatusClass) -> Style {
        let color = match class {
            StatusClass::Active => self.success,
            StatusClass::Inactive => self.error,
            StatusClass::Other => self.warning,
        };
        Style::new().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn validation(&self, kind: ValidationKind) -> Style {
        let color = match kind {
            ValidationKind::Validated => self.success,
            ValidationKind::Failed => self.error,
            ValidationKind::Pending => self.muted,
            ValidationKind::Other => self.warning,
        };
        Style::new().fg(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_get_distinct_colours() {
        let theme = Theme::default();
        assert_eq!(theme.status(StatusClass::Active).fg, Some(theme.success));
        assert_eq!(theme.status(StatusClass::Inactive).fg, Some(theme.error));
        assert_eq!(theme.status(StatusClass::Other).fg, Some(theme.warning));
        assert_eq!(theme.validation(ValidationKind::Pending).fg, Some(theme.muted));
    }
}
