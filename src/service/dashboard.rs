//! 仪表盘统计：对物料与库存变动两组集合做纯计算。

use crate::model::{Insumo, Movimentacao, TipoMovimentacao};
use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

pub const CRITICAL_THRESHOLD: i32 = 10;
pub const TREND_DAYS: usize = 7;

/// 判断物料是否处于临界状态
pub type CriticalPolicy = fn(&Insumo) -> bool;

/// 按现有行为比较的是 `quantidade_critica` 字段本身
pub fn threshold_field_below_ten(insumo: &Insumo) -> bool {
    insumo.quantidade_critica.unwrap_or(0) < CRITICAL_THRESHOLD
}

/// 库存不高于临界值
pub fn stock_at_or_below_threshold(insumo: &Insumo) -> bool {
    insumo.quantidade_estoque.unwrap_or(0) <= insumo.quantidade_critica.unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub labels: [&'static str; 2],
    pub entradas: usize,
    pub saidas: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trend {
    pub labels: [String; TREND_DAYS],
    pub counts: [usize; TREND_DAYS],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub total_insumos: usize,
    pub insumos_criticos: usize,
    pub movimentacoes_mes: usize,
    pub entradas_mes: usize,
    pub distribution: Distribution,
    pub trend: Trend,
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardAggregator {
    policy: CriticalPolicy,
}

impl Default for DashboardAggregator {
    fn default() -> Self {
        Self::with_policy(threshold_field_below_ten)
    }
}

impl DashboardAggregator {
    pub fn with_policy(policy: CriticalPolicy) -> Self {
        Self { policy }
    }

    pub fn aggregate_now(&self, insumos: &[Insumo], movimentacoes: &[Movimentacao]) -> DashboardView {
        self.aggregate(insumos, movimentacoes, Local::now().naive_local())
    }

    /// `now` 为本地时间
    pub fn aggregate(
        &self,
        insumos: &[Insumo],
        movimentacoes: &[Movimentacao],
        now: NaiveDateTime,
    ) -> DashboardView {
        let today = now.date();
        let days = trend_days(today);
        let first_day = days[0];

        let mut movimentacoes_mes = 0;
        let mut entradas_mes = 0;
        let mut entradas = 0;
        let mut saidas = 0;
        let mut counts = [0usize; TREND_DAYS];

        for m in movimentacoes {
            match m.tipo {
                TipoMovimentacao::Entrada => entradas += 1,
                TipoMovimentacao::Saida => saidas += 1,
                TipoMovimentacao::Desconhecido => {}
            }

            // 时间无法解析的记录不参与按月、按日统计
            let Some(date) = m.parsed_date().map(|dt| dt.date()) else {
                continue;
            };

            if date.year() == today.year() && date.month() == today.month() {
                movimentacoes_mes += 1;
                if m.tipo == TipoMovimentacao::Entrada {
                    entradas_mes += 1;
                }
            }

            if date >= first_day && date <= today {
                let index = (date - first_day).num_days() as usize;
                counts[index] += 1;
            }
        }

        DashboardView {
            total_insumos: insumos.len(),
            insumos_criticos: insumos.iter().filter(|i| (self.policy)(*i)).count(),
            movimentacoes_mes,
            entradas_mes,
            distribution: Distribution {
                labels: ["Entradas", "Saídas"],
                entradas,
                saidas,
            },
            trend: Trend {
                labels: days.map(|d| d.format("%d/%m").to_string()),
                counts,
            },
        }
    }
}

/// 以今天结尾的连续七天，按时间升序
fn trend_days(today: NaiveDate) -> [NaiveDate; TREND_DAYS] {
    std::array::from_fn(|i| {
        let back = (TREND_DAYS - 1 - i) as u64;
        today.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
    })
}
