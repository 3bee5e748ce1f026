//! Customer-facing WhatsApp copy (pt-BR).

pub const WELCOME_NEW: &str = "Olá! 👋\n\nBem-vindo(a) ao consultório.\n\nParece que é sua primeira vez aqui. Vamos fazer seu cadastro rápido para melhor atendê-lo(a).";

pub const MAIN_MENU: &str = "📋 *Menu Principal*\n\nEscolha uma opção:\n\n1️⃣ Agendar sessão\n2️⃣ Minhas sessões\n3️⃣ Reagendar sessão\n4️⃣ Cancelar sessão\n5️⃣ Falar com atendente";

pub const ASK_NAME: &str = "Por favor, digite seu *nome completo*:";

pub const NAME_INVALID: &str =
    "❌ Nome muito curto. Por favor, digite seu *nome completo*:";

pub const ASK_CPF: &str = "Agora, digite seu *CPF* (apenas números):";

pub const CPF_INVALID: &str =
    "❌ CPF inválido. Por favor, digite um CPF válido (apenas números):";

pub const ASK_EMAIL: &str =
    "Digite seu *e-mail* (opcional - digite \"pular\" para continuar sem e-mail):";

pub const EMAIL_INVALID: &str =
    "❌ E-mail inválido. Digite um e-mail válido ou \"pular\" para continuar sem e-mail:";

pub fn registration_done(name: &str) -> String {
    format!(
        "✅ Cadastro realizado com sucesso, {}!\n\nAgora você pode agendar suas sessões.",
        name
    )
}

pub const ASK_DATE: &str = "📅 *Agendamento de Sessão*\n\nPor favor, digite a data desejada no formato:\n*DD/MM/AAAA*\n\nExemplo: 15/01/2026";

pub const DATE_INVALID: &str =
    "❌ Data inválida. Por favor, digite uma data válida no formato DD/MM/AAAA";

pub const DATE_IN_PAST: &str =
    "❌ Não é possível agendar para datas passadas. Por favor, escolha uma data futura.";

pub const NO_SLOTS: &str =
    "😔 Infelizmente não há horários disponíveis para esta data.\n\nPor favor, escolha outra data:";

pub fn slot_list(date: &str, slots: &[String]) -> String {
    let lines: Vec<String> = slots
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{}️⃣ {}", i + 1, h))
        .collect();
    format!(
        "📅 *Horários disponíveis para {}:*\n\n{}\n\nDigite o *número* do horário desejado:",
        date,
        lines.join("\n")
    )
}

pub fn booking_confirmed(date: &str, time: &str, price: &str) -> String {
    format!(
        "✅ *Sessão agendada com sucesso!*\n\n📅 Data: {}\n⏰ Horário: {}\n💰 Valor: {}\n\nVocê receberá um lembrete 24h e 2h antes da sessão.\n\nAté logo! 👋",
        date, time, price
    )
}

pub const SLOT_TAKEN: &str =
    "😔 Esse horário acabou de ser ocupado. Por favor, escolha outro:";

pub fn appointment_list(entries: &str) -> String {
    format!("📋 *Suas sessões agendadas:*\n\n{}", entries)
}

pub const NO_APPOINTMENTS: &str =
    "Você não possui sessões agendadas no momento.\n\nDeseja agendar uma nova sessão?";

pub fn choose_to_reschedule(entries: &str) -> String {
    format!(
        "📋 *Qual sessão deseja reagendar?*\n\n{}\n\nDigite o número da sessão:",
        entries
    )
}

pub const ASK_NEW_DATE: &str = "📅 Digite a *nova data* desejada (DD/MM/AAAA):";

pub fn reschedule_confirmed(old_date: &str, new_date: &str, time: &str) -> String {
    format!(
        "✅ *Sessão reagendada com sucesso!*\n\n❌ Antiga: {}\n✅ Nova: {} às {}\n\nAté logo! 👋",
        old_date, new_date, time
    )
}

pub fn choose_to_cancel(entries: &str) -> String {
    format!(
        "📋 *Qual sessão deseja cancelar?*\n\n{}\n\nDigite o número da sessão:",
        entries
    )
}

pub fn confirm_cancellation(date: &str, time: &str) -> String {
    format!(
        "⚠️ *Confirma o cancelamento da sessão?*\n\n📅 Data: {}\n⏰ Horário: {}\n\nDigite *SIM* para confirmar ou *NÃO* para voltar:",
        date, time
    )
}

pub const CANCELLATION_DONE: &str =
    "✅ Sessão cancelada com sucesso.\n\nEsperamos vê-lo(a) em breve! 👋";

pub const CANCELLATION_ABORTED: &str =
    "OK, o cancelamento foi desfeito. Sua sessão continua agendada.";

pub const TRANSFER_TO_HUMAN: &str = "🔄 Aguarde, estou transferindo você para um de nossos atendentes...\n\nEm breve alguém entrará em contato.";

pub const IN_HUMAN_SERVICE: &str = "👤 Você está em atendimento com nossa equipe.\n\nPara voltar ao menu automático, digite *MENU*.";

pub const HANDOFF_ENDED: &str = "✅ Atendimento humano finalizado. De volta ao menu automático!";

pub const GENERIC_ERROR: &str = "😔 Desculpe, ocorreu um erro. Por favor, tente novamente ou digite *MENU* para voltar ao início.";

pub const OPTION_INVALID: &str =
    "❌ Opção inválida. Por favor, escolha uma das opções disponíveis.";

pub const TIME_INVALID: &str =
    "❌ Horário inválido. Por favor, escolha um dos horários listados.";
